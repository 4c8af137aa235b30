//! # TourDesk Common Library
//!
//! Shared code for the TourDesk services including:
//! - Error taxonomy
//! - Configuration loading and root folder resolution
//! - SQLite store (schema, models, per-resource repositories)
//! - Query translation (filters, sort, projection, pagination)
//! - Ratings aggregate maintenance
//! - Caller identity and authorization policy

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod query;
pub mod ratings;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, FieldError, Result};
pub use ratings::{RatingsAggregate, RatingsEngine, ReviewMutation};
