//! Caller identity and authorization shared by the HTTP layer
//!
//! Contains ONLY framework-free code: identity verification, role and
//! ownership policy, and shared secret storage. The axum extractor lives in
//! `tourdesk-api`.

pub mod auth;

pub use auth::{
    authorize_owner, authorize_roles, calculate_hash, initialize_shared_secret,
    load_shared_secret, validate_hash, validate_timestamp, ApiAuthError, Caller,
};
