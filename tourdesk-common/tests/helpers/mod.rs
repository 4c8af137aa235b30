//! Shared fixtures for tourdesk-common integration tests

#![allow(dead_code)]

use sqlx::SqlitePool;
use tempfile::TempDir;
use tourdesk_common::api::auth::Caller;
use tourdesk_common::db::init::init_database;
use tourdesk_common::db::models::{Role, Tour, User};
use tourdesk_common::db::tours::{create_tour, TourInput};
use tourdesk_common::db::users::{create_user, UserInput};

/// Fresh database in a temporary directory; keep the `TempDir` alive for the
/// duration of the test
pub async fn setup_db() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let pool = init_database(&dir.path().join("tourdesk.db"))
        .await
        .expect("Should initialize database");
    (dir, pool)
}

pub fn tour_input(name: &str, price: f64) -> TourInput {
    TourInput {
        name: Some(name.to_string()),
        duration: Some(5),
        max_group_size: Some(10),
        difficulty: Some("medium".to_string()),
        price: Some(price),
        summary: Some(format!("Summary of {}", name)),
        image_cover: Some("cover.jpg".to_string()),
        ..Default::default()
    }
}

pub async fn insert_tour(db: &SqlitePool, name: &str, price: f64) -> Tour {
    create_tour(db, &tour_input(name, price))
        .await
        .expect("Should create tour")
}

pub async fn insert_user(db: &SqlitePool, name: &str, role: Role) -> User {
    create_user(
        db,
        &UserInput {
            name: Some(name.to_string()),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            role: Some(role.as_str().to_string()),
            ..Default::default()
        },
    )
    .await
    .expect("Should create user")
}

pub async fn insert_caller(db: &SqlitePool, name: &str, role: Role) -> Caller {
    let user = insert_user(db, name, role).await;
    Caller::new(user.id, user.role)
}
