//! Tests for database initialization

use tourdesk_common::api::auth::load_shared_secret;
use tourdesk_common::db::init::init_database;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("tourdesk.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tourdesk.db");

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    // Schema creation is idempotent
    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("tourdesk.db")).await.unwrap();

    for table in ["settings", "users", "tours", "reviews"] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_shared_secret_generated_once() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("tourdesk.db")).await.unwrap();

    let first = load_shared_secret(&pool).await.unwrap();
    let second = load_shared_secret(&pool).await.unwrap();

    assert_ne!(first, 0);
    assert_eq!(first, second);
}
