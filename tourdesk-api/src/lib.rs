//! tourdesk-api library - HTTP surface for tours, reviews and users
//!
//! Routes live under `/api/v1`; `/health` sits at the root and needs no
//! identity. Anything else answers with a 404 envelope.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use tourdesk_common::RatingsEngine;
use tower_http::trace::TraceLayer;

pub mod api;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Shared secret for identity header verification (0 disables it)
    pub shared_secret: i64,
    /// Keeps tour ratings in step with review mutations
    pub ratings: RatingsEngine,
}

impl AppState {
    pub fn new(db: SqlitePool, shared_secret: i64) -> Self {
        let ratings = RatingsEngine::new(db.clone());
        Self {
            db,
            shared_secret,
            ratings,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api::v1_routes())
        .merge(api::health_routes())
        .fallback(api::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
