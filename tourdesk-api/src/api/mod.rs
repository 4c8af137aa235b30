//! HTTP API handlers for tourdesk-api

pub mod auth;
pub mod error;
pub mod handler;
pub mod health;
pub mod reviews;
pub mod tours;
pub mod users;

use axum::extract::OriginalUri;
use axum::routing::get;
use axum::Router;

use crate::AppState;

pub use auth::Authenticated;
pub use error::{ApiError, ApiResult};
pub use health::health_routes;

/// Versioned resource routes, nested under `/api/v1`
///
/// `/tours/:id/reviews` shares the `:id` segment name with `/tours/:id`; the
/// router rejects differently named parameters in the same position.
pub fn v1_routes() -> Router<AppState> {
    Router::new()
        .route("/tours", get(tours::list_tours).post(tours::create_tour))
        .route("/tours/top-5-cheap", get(tours::top_five_cheap))
        .route(
            "/tours/:id",
            get(tours::get_tour)
                .patch(tours::update_tour)
                .delete(tours::delete_tour),
        )
        .route(
            "/tours/:id/reviews",
            get(reviews::list_tour_reviews).post(reviews::create_tour_review),
        )
        .route("/reviews", get(reviews::list_reviews).post(reviews::create_review))
        .route(
            "/reviews/:id",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/me",
            get(users::get_me).patch(users::update_me).delete(users::delete_me),
        )
        .route(
            "/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
}

/// Fallback for unmatched paths
pub async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::NotFound(format!("Can't find {}", uri.path()))
}
