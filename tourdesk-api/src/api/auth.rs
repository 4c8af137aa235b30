//! Caller identity extraction
//!
//! Reads the identity headers set by the authentication front end and resolves
//! them to an active user. Public routes simply do not ask for
//! [`Authenticated`].

use axum::{extract::FromRequestParts, http::request::Parts};
use tourdesk_common::api::auth::{validate_hash, validate_timestamp, ApiAuthError, Caller};
use tourdesk_common::db::users::get_active_user;
use tracing::warn;

use super::error::ApiError;
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TIMESTAMP_HEADER: &str = "x-auth-timestamp";
pub const HASH_HEADER: &str = "x-auth-hash";

const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access.";

/// The verified caller of a request
#[derive(Debug, Clone)]
pub struct Authenticated(pub Caller);

#[axum::async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(NOT_LOGGED_IN.to_string()))?;

        // Secret 0 disables timestamp and hash checks
        if state.shared_secret != 0 {
            verify_signature(parts, &user_id, state.shared_secret)?;
        }

        let user = get_active_user(&state.db, &user_id).await?.ok_or_else(|| {
            ApiError::Unauthorized(
                "The user belonging to this identity no longer exists.".to_string(),
            )
        })?;

        Ok(Authenticated(Caller::new(user.id, user.role)))
    }
}

fn verify_signature(parts: &Parts, user_id: &str, shared_secret: i64) -> Result<(), ApiError> {
    let timestamp = header_value(parts, TIMESTAMP_HEADER)
        .and_then(|t| t.parse::<i64>().ok())
        .ok_or_else(|| rejected(ApiAuthError::MissingHeader(TIMESTAMP_HEADER)))?;
    let hash = header_value(parts, HASH_HEADER)
        .ok_or_else(|| rejected(ApiAuthError::MissingHeader(HASH_HEADER)))?;

    validate_timestamp(timestamp).map_err(rejected)?;
    validate_hash(&hash, user_id, timestamp, shared_secret).map_err(|e| {
        if let ApiAuthError::InvalidHash { provided, calculated } = &e {
            warn!(
                "Hash validation failed for {}: provided={}, calculated={}",
                user_id, provided, calculated
            );
        }
        rejected(e)
    })
}

fn rejected(err: ApiAuthError) -> ApiError {
    match err {
        ApiAuthError::DatabaseError(e) => ApiError::internal(e),
        other => ApiError::Unauthorized(other.to_string()),
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
