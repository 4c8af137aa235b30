//! import-dev-data - Load or wipe the development dataset
//!
//! `-i` reads `users.json`, `tours.json` and `reviews.json` from the data
//! directory into the database, then recomputes every tour's ratings.
//! `-d` deletes all reviews, tours and users.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::SqlitePool;
use tourdesk_common::config::ServiceConfig;
use tourdesk_common::db::init::init_database;
use tourdesk_common::db::models::Role;
use tourdesk_common::db::reviews::ReviewInput;
use tourdesk_common::db::tours::TourInput;
use tourdesk_common::db::users::UserInput;
use tourdesk_common::{time, uuid_utils, RatingsEngine};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "import-dev-data")]
#[command(about = "Import or delete the TourDesk development dataset")]
struct Args {
    /// Import the dataset
    #[arg(short = 'i', long = "import", conflicts_with = "delete")]
    import: bool,

    /// Delete all tours, reviews and users
    #[arg(short = 'd', long = "delete")]
    delete: bool,

    /// Directory holding users.json, tours.json and reviews.json
    #[arg(long, default_value = "dev-data")]
    data_dir: PathBuf,

    /// Root folder holding the database
    #[arg(short, long, env = "TOURDESK_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,
}

/// A seed document: optional fixed id (`_id` accepted) plus the regular input
#[derive(Debug, Deserialize)]
struct Seed<T> {
    #[serde(alias = "_id")]
    id: Option<String>,
    #[serde(flatten)]
    fields: T,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "import_dev_data=info,tourdesk_common=info".into()),
        )
        .init();

    let args = Args::parse();
    if !args.import && !args.delete {
        bail!("Nothing to do: pass -i to import or -d to delete");
    }

    let config = ServiceConfig::resolve(args.root_folder.as_deref(), None, None)
        .context("Failed to resolve configuration")?;
    let db = init_database(&config.db_path)
        .await
        .with_context(|| format!("Failed to open {}", config.db_path.display()))?;

    if args.delete {
        delete_all(&db).await?;
    } else {
        import_all(&db, &args.data_dir).await?;
    }
    Ok(())
}

async fn delete_all(db: &SqlitePool) -> Result<()> {
    let mut tx = db.begin().await?;
    let reviews = sqlx::query("DELETE FROM reviews").execute(&mut *tx).await?;
    let tours = sqlx::query("DELETE FROM tours").execute(&mut *tx).await?;
    let users = sqlx::query("DELETE FROM users").execute(&mut *tx).await?;
    tx.commit().await?;

    info!(
        "Data successfully deleted: {} users, {} tours, {} reviews",
        users.rows_affected(),
        tours.rows_affected(),
        reviews.rows_affected()
    );
    Ok(())
}

async fn import_all(db: &SqlitePool, data_dir: &Path) -> Result<()> {
    let users: Vec<Seed<UserInput>> = read_seed(&data_dir.join("users.json"))?;
    let tours: Vec<Seed<TourInput>> = read_seed(&data_dir.join("tours.json"))?;
    let reviews: Vec<Seed<ReviewInput>> = read_seed(&data_dir.join("reviews.json"))?;

    let now = time::now();
    let mut tx = db.begin().await?;

    for seed in &users {
        let user = &seed.fields;
        user.validate(true)
            .with_context(|| format!("Invalid user {:?}", user.email))?;
        sqlx::query(
            "INSERT INTO users (guid, name, email, role, photo, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(seed_id(&seed.id)?)
        .bind(user.name.as_deref().map(str::trim))
        .bind(user.email.as_deref().map(|e| e.trim().to_lowercase()))
        .bind(user.role.as_deref().unwrap_or(Role::User.as_str()))
        .bind(&user.photo)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert user {:?}", user.email))?;
    }

    for seed in &tours {
        let tour = &seed.fields;
        tour.validate(true)
            .with_context(|| format!("Invalid tour {:?}", tour.name))?;
        sqlx::query(
            r#"
            INSERT INTO tours (
                guid, name, duration, max_group_size, difficulty, price, price_discount,
                summary, description, image_cover, images, start_dates, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(seed_id(&seed.id)?)
        .bind(tour.name.as_deref().map(str::trim))
        .bind(tour.duration)
        .bind(tour.max_group_size)
        .bind(&tour.difficulty)
        .bind(tour.price)
        .bind(tour.price_discount)
        .bind(&tour.summary)
        .bind(&tour.description)
        .bind(&tour.image_cover)
        .bind(Json(tour.images.as_deref().unwrap_or_default()))
        .bind(Json(tour.start_dates.as_deref().unwrap_or_default()))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert tour {:?}", tour.name))?;
    }

    for seed in &reviews {
        let review = &seed.fields;
        review.validate(true).context("Invalid review")?;
        let (Some(tour_id), Some(user_id)) = (&review.tour_id, &review.user_id) else {
            bail!("Every review needs a tour and a user");
        };
        sqlx::query(
            "INSERT INTO reviews (guid, review, rating, tour_id, user_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(seed_id(&seed.id)?)
        .bind(review.review.as_deref().map(str::trim))
        .bind(review.rating)
        .bind(tour_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert review of tour {} by {}", tour_id, user_id))?;
    }

    tx.commit().await?;

    let refreshed = RatingsEngine::new(db.clone()).refresh_all().await?;
    info!(
        "Data successfully loaded: {} users, {} tours, {} reviews ({} aggregates refreshed)",
        users.len(),
        tours.len(),
        reviews.len(),
        refreshed
    );
    Ok(())
}

fn read_seed<T: DeserializeOwned>(path: &Path) -> Result<Vec<Seed<T>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn seed_id(id: &Option<String>) -> Result<String> {
    match id {
        Some(id) if uuid_utils::is_valid(id) => Ok(id.clone()),
        Some(id) => bail!("Seed id {} is not a UUID", id),
        None => Ok(uuid_utils::generate()),
    }
}
