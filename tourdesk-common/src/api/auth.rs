//! Caller identity via signed identity headers
//!
//! Authentication itself (passwords, sessions, reset tokens) happens in a front
//! end outside this service. That front end forwards the caller's user id with a
//! timestamp and a SHA-256 hash keyed by a shared secret:
//!
//! - `x-user-id`: the caller's user id
//! - `x-auth-timestamp`: Unix epoch milliseconds
//! - `x-auth-hash`: hex SHA-256 of `"{user_id}:{timestamp}{shared_secret}"`
//!
//! A shared secret of 0 disables timestamp and hash checks; only the user id is
//! read. Everything here is a pure function or a database operation.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::db::models::Role;
use crate::time::now_millis;
use crate::{Error, Result};

/// Oldest accepted timestamp relative to now
pub const MAX_TIMESTAMP_AGE_MS: i64 = 5000;
/// Clock drift tolerated for timestamps from the future
pub const MAX_TIMESTAMP_SKEW_MS: i64 = 1000;

/// Authenticated caller, passed explicitly into every operation that needs it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Identity verification failures
#[derive(Debug, Clone)]
pub enum ApiAuthError {
    /// Timestamp outside acceptable window
    InvalidTimestamp { timestamp: i64, now: i64, reason: String },

    /// Hash does not match calculated value
    InvalidHash { provided: String, calculated: String },

    /// A required identity header is absent or unparsable
    MissingHeader(&'static str),

    /// Database error loading shared secret
    DatabaseError(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::InvalidTimestamp { reason, .. } => {
                write!(f, "Invalid timestamp: {}", reason)
            }
            ApiAuthError::InvalidHash { .. } => write!(f, "Invalid hash"),
            ApiAuthError::MissingHeader(name) => write!(f, "Missing {} header", name),
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Shared Secret Management
// ========================================

/// Load shared secret from database settings, generating one when absent
///
/// - Key: `api_shared_secret`
/// - Value: i64
/// - Special value 0: Disables hash checking
pub async fn load_shared_secret(db: &SqlitePool) -> std::result::Result<i64, ApiAuthError> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = 'api_shared_secret'")
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match result {
        Some((value,)) => value
            .parse::<i64>()
            .map_err(|e| ApiAuthError::DatabaseError(format!("Invalid i64: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate and store a cryptographically random non-zero secret
pub async fn initialize_shared_secret(db: &SqlitePool) -> std::result::Result<i64, ApiAuthError> {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let secret: i64 = loop {
        let val = rng.gen::<i64>();
        if val != 0 {
            break val;
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES ('api_shared_secret', ?)")
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

// ========================================
// Timestamp and Hash Validation
// ========================================

/// Validate an identity timestamp against the current clock
pub fn validate_timestamp(timestamp: i64) -> std::result::Result<(), ApiAuthError> {
    validate_timestamp_at(timestamp, now_millis())
}

fn validate_timestamp_at(timestamp: i64, now: i64) -> std::result::Result<(), ApiAuthError> {
    let diff = now - timestamp;

    if diff > MAX_TIMESTAMP_AGE_MS {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!("Timestamp {}ms too old (max {}ms past)", diff, MAX_TIMESTAMP_AGE_MS),
        });
    }

    if diff < -MAX_TIMESTAMP_SKEW_MS {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!(
                "Timestamp {}ms in future (max {}ms future)",
                diff.abs(),
                MAX_TIMESTAMP_SKEW_MS
            ),
        });
    }

    Ok(())
}

/// Hex SHA-256 over `"{user_id}:{timestamp}{shared_secret}"`
pub fn calculate_hash(user_id: &str, timestamp: i64, shared_secret: i64) -> String {
    let to_hash = format!("{}:{}{}", user_id, timestamp, shared_secret);

    let mut hasher = Sha256::new();
    hasher.update(to_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Validate hash matches calculated value
pub fn validate_hash(
    provided_hash: &str,
    user_id: &str,
    timestamp: i64,
    shared_secret: i64,
) -> std::result::Result<(), ApiAuthError> {
    let calculated = calculate_hash(user_id, timestamp, shared_secret);

    if !provided_hash.eq_ignore_ascii_case(&calculated) {
        return Err(ApiAuthError::InvalidHash {
            provided: provided_hash.to_string(),
            calculated,
        });
    }

    Ok(())
}

// ========================================
// Authorization Policy
// ========================================

/// Require the caller to hold one of `roles`
pub fn authorize_roles(caller: &Caller, roles: &[Role]) -> Result<()> {
    if roles.contains(&caller.role) {
        Ok(())
    } else {
        Err(Error::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ))
    }
}

/// Require the caller to own the resource, or be an admin
///
/// A failed ownership check is a 403, never remapped to 404.
pub fn authorize_owner(caller: &Caller, owner_id: &str) -> Result<()> {
    if caller.is_admin() || caller.user_id == owner_id {
        Ok(())
    } else {
        Err(Error::Forbidden(
            "You can only modify resources you created".to_string(),
        ))
    }
}
