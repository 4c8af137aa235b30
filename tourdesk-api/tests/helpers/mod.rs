//! Shared fixtures for tourdesk-api router tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tourdesk_api::{build_router, AppState};
use tourdesk_common::db::init::init_database;
use tourdesk_common::db::models::{Role, Tour, User};
use tourdesk_common::db::tours::{create_tour, TourInput};
use tourdesk_common::db::users::{create_user, UserInput};
use tower::util::ServiceExt;

/// Database plus app with identity verification disabled (secret 0)
pub struct TestApp {
    pub db: SqlitePool,
    pub app: Router,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_secret(0).await
    }

    pub async fn with_secret(shared_secret: i64) -> Self {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let db = init_database(&dir.path().join("tourdesk.db"))
            .await
            .expect("Should initialize database");
        let app = build_router(AppState::new(db.clone(), shared_secret));
        Self { db, app, _dir: dir }
    }

    pub async fn send(&self, request: Request<Body>) -> (u16, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        split(response).await
    }

    pub async fn user(&self, name: &str, role: Role) -> User {
        create_user(
            &self.db,
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

    pub async fn tour(&self, name: &str, price: f64) -> Tour {
        create_tour(
            &self.db,
            &TourInput {
                name: Some(name.to_string()),
                duration: Some(5),
                max_group_size: Some(10),
                difficulty: Some("easy".to_string()),
                price: Some(price),
                summary: Some("A fine tour".to_string()),
                image_cover: Some("cover.jpg".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("Should create tour")
    }
}

/// Status code and JSON body (Null for an empty body)
pub async fn split(response: Response<Body>) -> (u16, Value) {
    let status = response.status().as_u16();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    };
    (status, body)
}

/// Anonymous request
pub fn anonymous(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Request carrying only `x-user-id` (enough when the secret is 0)
pub fn as_user(method: &str, uri: &str, user_id: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user_id)
        .body(Body::empty())
        .unwrap()
}

/// JSON request carrying `x-user-id`
pub fn as_user_json(method: &str, uri: &str, user_id: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user_id)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
