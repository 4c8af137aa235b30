//! Identity header verification with a non-zero shared secret

mod helpers;

use axum::body::Body;
use axum::http::Request;
use helpers::TestApp;
use tourdesk_common::api::auth::calculate_hash;
use tourdesk_common::db::models::Role;
use tourdesk_common::time::now_millis;

const SECRET: i64 = 12345;

fn signed(uri: &str, user_id: &str, timestamp: i64, hash: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-user-id", user_id)
        .header("x-auth-timestamp", timestamp.to_string())
        .header("x-auth-hash", hash)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_valid_signature_accepted() {
    let t = TestApp::with_secret(SECRET).await;
    let user = t.user("Sophie", Role::User).await;
    let ts = now_millis();
    let hash = calculate_hash(&user.id, ts, SECRET);

    let (status, body) = t.send(signed("/api/v1/users/me", &user.id, ts, &hash)).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["user"]["id"], user.id.as_str());
}

#[tokio::test]
async fn test_wrong_hash_rejected() {
    let t = TestApp::with_secret(SECRET).await;
    let user = t.user("Sophie", Role::User).await;
    let ts = now_millis();
    let hash = calculate_hash(&user.id, ts, SECRET + 1);

    let (status, body) = t.send(signed("/api/v1/users/me", &user.id, ts, &hash)).await;

    assert_eq!(status, 401);
    assert_eq!(body["status"], "fail");
}

#[tokio::test]
async fn test_hash_for_other_user_rejected() {
    let t = TestApp::with_secret(SECRET).await;
    let user = t.user("Sophie", Role::User).await;
    let admin = t.user("Root", Role::Admin).await;
    let ts = now_millis();
    let hash = calculate_hash(&user.id, ts, SECRET);

    // Signature minted for one user cannot be replayed under another id
    let (status, _) = t.send(signed("/api/v1/users", &admin.id, ts, &hash)).await;

    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_stale_timestamp_rejected() {
    let t = TestApp::with_secret(SECRET).await;
    let user = t.user("Sophie", Role::User).await;
    let ts = now_millis() - 60_000;
    let hash = calculate_hash(&user.id, ts, SECRET);

    let (status, _) = t.send(signed("/api/v1/users/me", &user.id, ts, &hash)).await;

    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let t = TestApp::with_secret(SECRET).await;
    let user = t.user("Sophie", Role::User).await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/users/me")
        .header("x-user-id", user.id.as_str())
        .body(Body::empty())
        .unwrap();
    let (status, body) = t.send(request).await;

    assert_eq!(status, 401);
    assert!(body["message"].as_str().unwrap().contains("x-auth-timestamp"));
}

#[tokio::test]
async fn test_unknown_user_rejected() {
    let t = TestApp::with_secret(SECRET).await;
    let ts = now_millis();
    let hash = calculate_hash("ghost", ts, SECRET);

    let (status, _) = t.send(signed("/api/v1/users/me", "ghost", ts, &hash)).await;

    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_public_routes_need_no_signature() {
    let t = TestApp::with_secret(SECRET).await;
    t.tour("The Forest Hiker", 397.0).await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/tours")
        .body(Body::empty())
        .unwrap();
    let (status, body) = t.send(request).await;

    assert_eq!(status, 200);
    assert_eq!(body["results"], 1);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let t = TestApp::with_secret(0).await;
    let admin = t.user("Root", Role::Admin).await;

    let large_body = vec![b'x'; tourdesk_api::MAX_BODY_BYTES + 1024];
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/tours")
        .header("x-user-id", admin.id.as_str())
        .header("content-type", "application/json")
        .body(Body::from(large_body))
        .unwrap();
    let response = tower::util::ServiceExt::oneshot(t.app.clone(), request)
        .await
        .unwrap();

    assert!(
        response.status() == 413 || response.status() == 400,
        "Expected 413/400 for oversized body, got {}",
        response.status()
    );
}
