//! User endpoints
//!
//! `/users/me` lets any authenticated caller manage their own profile; every
//! other route is admin only. Deactivated users are invisible to all reads.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tourdesk_common::api::auth::{authorize_roles, Caller};
use tourdesk_common::db::models::Role;
use tourdesk_common::db::users::{self as store, UserInput};
use tourdesk_common::query::filter::FilterValue;
use tourdesk_common::query::pipeline::{BaseRead, QueryParams};
use tourdesk_common::query::schema::USERS;
use tracing::info;

use super::auth::Authenticated;
use super::error::ApiResult;
use super::handler;
use crate::AppState;

fn active_users() -> BaseRead {
    BaseRead::new(&USERS).scoped("active", FilterValue::Integer(1))
}

fn active_user(id: &str) -> BaseRead {
    BaseRead::by_id(&USERS, id).scoped("active", FilterValue::Integer(1))
}

fn require_admin(caller: &Caller) -> ApiResult<()> {
    authorize_roles(caller, &[Role::Admin])?;
    Ok(())
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    require_admin(&caller)?;
    handler::list(&state, active_users(), &params).await
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    body: Result<Json<UserInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_admin(&caller)?;
    let Json(input) = body?;

    let user = store::create_user(&state.db, &input).await?;
    info!("User {} created by {}", user.id, caller.user_id);
    Ok(handler::created(USERS.document, user))
}

/// GET /api/v1/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    require_admin(&caller)?;
    handler::read_one(&state, active_user(&id), &params).await
}

/// PATCH /api/v1/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    body: Result<Json<UserInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    require_admin(&caller)?;
    let Json(input) = body?;

    let user = store::update_user(&state.db, &id, &input, true).await?;
    Ok(handler::single(USERS.document, user))
}

/// DELETE /api/v1/users/:id
///
/// Hard delete. The user's reviews go with them and the tours they reviewed
/// get fresh aggregates.
pub async fn delete_user(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_admin(&caller)?;

    store::delete_user(&state.db, &state.ratings, &id).await?;
    info!("User {} deleted by {}", id, caller.user_id);
    Ok(handler::deleted())
}

/// GET /api/v1/users/me
pub async fn get_me(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    handler::read_one(&state, active_user(&caller.user_id), &params).await
}

/// PATCH /api/v1/users/me
///
/// Name, email and photo only; password fields and role changes are rejected.
pub async fn update_me(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    body: Result<Json<UserInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = body?;

    let user = store::update_user(&state.db, &caller.user_id, &input, false).await?;
    Ok(handler::single(USERS.document, user))
}

/// DELETE /api/v1/users/me
///
/// Deactivates the account; it can no longer authenticate.
pub async fn delete_me(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<StatusCode> {
    store::deactivate_user(&state.db, &caller.user_id).await?;
    info!("User {} deactivated their account", caller.user_id);
    Ok(StatusCode::NO_CONTENT)
}
