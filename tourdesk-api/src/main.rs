//! tourdesk-api - Tours, reviews and users over HTTP
//!
//! Serves the `/api/v1` JSON API backed by a SQLite database in the root
//! folder. Caller identity comes from an authentication front end via signed
//! headers.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tourdesk_api::{build_router, AppState};
use tourdesk_common::api::auth::load_shared_secret;
use tourdesk_common::config::ServiceConfig;
use tourdesk_common::db::init::init_database;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "tourdesk-api")]
#[command(about = "Tours, reviews and users JSON API")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "TOURDESK_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "TOURDESK_HOST")]
    host: Option<String>,

    /// Root folder holding the database
    #[arg(short, long, env = "TOURDESK_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tourdesk_api=debug,tourdesk_common=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any database delay
    info!(
        "Starting TourDesk API (tourdesk-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = ServiceConfig::resolve(args.root_folder.as_deref(), args.host.as_deref(), args.port)
        .context("Failed to resolve configuration")?;

    info!("Root folder: {}", config.root_folder.display());
    info!("Database path: {}", config.db_path.display());

    let pool = match init_database(&config.db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let shared_secret = load_shared_secret(&pool)
        .await
        .context("Failed to load shared secret")?;
    if shared_secret == 0 {
        info!("Identity verification disabled (shared_secret = 0)");
    } else {
        info!("✓ Loaded shared secret for identity verification");
    }

    let app = build_router(AppState::new(pool, shared_secret));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("tourdesk-api listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("tourdesk-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
