//! HTTP error taxonomy and the failure envelope
//!
//! Every failure leaves the service as
//! `{"status": "fail", "message": ..., "errors"?: {field: message}}`.

use axum::extract::rejection::JsonRejection;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use sqlx::error::ErrorKind;
use thiserror::Error;
use tourdesk_common::error::{join_messages, FieldError};
use tracing::error;

const INTERNAL_MESSAGE: &str = "Something went wrong";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller-correctable input problems (400)
    #[error("{}", join_messages(.0))]
    Validation(Vec<FieldError>),

    /// Duplicate unique value (400)
    #[error("{0}")]
    Conflict(String),

    /// Missing or unverifiable identity (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Identity known, action not permitted (403)
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Internal server error (500); the detail is logged, never sent
    #[error("{0}")]
    Internal(String),
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn internal(detail: impl std::fmt::Display) -> Self {
        error!("Internal error: {}", detail);
        ApiError::Internal(detail.to_string())
    }
}

impl From<tourdesk_common::Error> for ApiError {
    fn from(err: tourdesk_common::Error) -> Self {
        use tourdesk_common::Error;

        match err {
            Error::Validation(errors) => ApiError::Validation(errors),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::Database(e) => ApiError::from(e),
            other => ApiError::internal(other),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return ApiError::NotFound("Resource not found".to_string());
        }

        let kind = err.as_database_error().map(|db| db.kind());
        match kind {
            Some(ErrorKind::UniqueViolation) => {
                ApiError::Conflict("Duplicate field value entered".to_string())
            }
            Some(ErrorKind::CheckViolation) | Some(ErrorKind::NotNullViolation) => {
                ApiError::Validation(vec![FieldError::new("body", "Invalid input data")])
            }
            Some(ErrorKind::ForeignKeyViolation) => ApiError::Validation(vec![FieldError::new(
                "body",
                "Referenced document does not exist",
            )]),
            _ => ApiError::internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(vec![FieldError::new("body", rejection.body_text())])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::Validation(errors) => {
                let mut fields = Map::new();
                for e in errors {
                    fields
                        .entry(e.field.clone())
                        .or_insert_with(|| Value::String(e.message.clone()));
                }
                json!({
                    "status": "fail",
                    "message": join_messages(errors),
                    "errors": fields,
                })
            }
            ApiError::Internal(_) => json!({
                "status": "fail",
                "message": INTERNAL_MESSAGE,
            }),
            other => json!({
                "status": "fail",
                "message": other.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
