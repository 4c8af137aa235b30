//! Document id utilities
//!
//! Documents are keyed by UUIDv4 strings stored in `guid` columns.

use uuid::Uuid;

/// Generate a new document id
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}

/// True when `s` parses as a UUID
///
/// Review creation uses this to reject a malformed tour id before any store call.
pub fn is_valid(s: &str) -> bool {
    Uuid::parse_str(s).is_ok()
}
