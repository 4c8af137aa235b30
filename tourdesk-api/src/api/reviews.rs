//! Review endpoints, top-level and nested under a tour
//!
//! Every mutation goes through the review store, which keeps the owning
//! tour's ratings aggregate current.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tourdesk_common::api::auth::authorize_roles;
use tourdesk_common::db::models::Role;
use tourdesk_common::db::reviews::{self as store, ReviewInput};
use tourdesk_common::query::filter::FilterValue;
use tourdesk_common::query::pipeline::{BaseRead, QueryParams};
use tourdesk_common::query::schema::REVIEWS;
use tourdesk_common::Error;

use super::auth::Authenticated;
use super::error::ApiResult;
use super::handler;
use crate::AppState;

const REVIEW_EDITORS: &[Role] = &[Role::User, Role::Admin];

/// GET /api/v1/reviews
pub async fn list_reviews(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    authorize_roles(&caller, &[Role::Admin])?;
    handler::list(&state, BaseRead::new(&REVIEWS), &params).await
}

/// POST /api/v1/reviews
///
/// The tour comes from the body (`tourId`, or `tour`).
pub async fn create_review(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    body: Result<Json<ReviewInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    authorize_roles(&caller, &[Role::User])?;
    let Json(input) = body?;

    let tour_id = input
        .tour_id
        .clone()
        .ok_or_else(|| Error::invalid("tourId", "Review must belong to a tour"))?;
    let review = store::create_review(&state.db, &state.ratings, &caller, &tour_id, &input).await?;
    Ok(handler::created(REVIEWS.document, review))
}

/// GET /api/v1/reviews/:id
pub async fn get_review(
    State(state): State<AppState>,
    Authenticated(_caller): Authenticated,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    handler::read_one(&state, BaseRead::by_id(&REVIEWS, &id), &params).await
}

/// PATCH /api/v1/reviews/:id
pub async fn update_review(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    body: Result<Json<ReviewInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    authorize_roles(&caller, REVIEW_EDITORS)?;
    let Json(input) = body?;

    let review = store::update_review(&state.db, &state.ratings, &caller, &id, &input).await?;
    Ok(handler::single(REVIEWS.document, review))
}

/// DELETE /api/v1/reviews/:id
pub async fn delete_review(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    authorize_roles(&caller, REVIEW_EDITORS)?;

    store::delete_review(&state.db, &state.ratings, &caller, &id).await?;
    Ok(handler::deleted())
}

/// GET /api/v1/tours/:id/reviews
pub async fn list_tour_reviews(
    State(state): State<AppState>,
    Authenticated(_caller): Authenticated,
    Path(tour_id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    let base = BaseRead::new(&REVIEWS).scoped("tourId", FilterValue::Text(tour_id));
    handler::list(&state, base, &params).await
}

/// POST /api/v1/tours/:id/reviews
///
/// The tour comes from the path; a tour named in the body is ignored.
pub async fn create_tour_review(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<String>,
    body: Result<Json<ReviewInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    authorize_roles(&caller, &[Role::User])?;
    let Json(input) = body?;

    let review = store::create_review(&state.db, &state.ratings, &caller, &tour_id, &input).await?;
    Ok(handler::created(REVIEWS.document, review))
}
