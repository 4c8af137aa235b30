//! Tour endpoints
//!
//! Reads are public. Writes need the `admin` or `lead-guide` role.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tourdesk_common::api::auth::authorize_roles;
use tourdesk_common::db::models::Role;
use tourdesk_common::db::tours::{self as store, TourInput};
use tourdesk_common::query::pipeline::{BaseRead, QueryParams};
use tourdesk_common::query::schema::TOURS;
use tracing::info;

use super::auth::Authenticated;
use super::error::ApiResult;
use super::handler;
use crate::AppState;

const TOUR_EDITORS: &[Role] = &[Role::Admin, Role::LeadGuide];

/// GET /api/v1/tours
pub async fn list_tours(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    handler::list(&state, BaseRead::new(&TOURS), &params).await
}

/// GET /api/v1/tours/top-5-cheap
///
/// Best rated first, cheapest among equals. Caller filters still apply.
pub async fn top_five_cheap(
    State(state): State<AppState>,
    Query(mut params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    params.insert("limit".to_string(), "5".to_string());
    params.insert("sort".to_string(), "-ratingsAverage,price".to_string());
    params.insert(
        "fields".to_string(),
        "name,price,ratingsAverage,summary,difficulty".to_string(),
    );
    handler::list(&state, BaseRead::new(&TOURS), &params).await
}

/// GET /api/v1/tours/:id
pub async fn get_tour(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    handler::read_one(&state, BaseRead::by_id(&TOURS, &id), &params).await
}

/// POST /api/v1/tours
pub async fn create_tour(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    body: Result<Json<TourInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    authorize_roles(&caller, TOUR_EDITORS)?;
    let Json(input) = body?;

    let tour = store::create_tour(&state.db, &input).await?;
    info!("Tour {} created by {}", tour.id, caller.user_id);
    Ok(handler::created(TOURS.document, tour))
}

/// PATCH /api/v1/tours/:id
pub async fn update_tour(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    body: Result<Json<TourInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    authorize_roles(&caller, TOUR_EDITORS)?;
    let Json(input) = body?;

    let tour = store::update_tour(&state.db, &id, &input).await?;
    Ok(handler::single(TOURS.document, tour))
}

/// DELETE /api/v1/tours/:id
pub async fn delete_tour(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    authorize_roles(&caller, TOUR_EDITORS)?;

    store::delete_tour(&state.db, &id).await?;
    info!("Tour {} deleted by {}", id, caller.user_id);
    Ok(handler::deleted())
}
