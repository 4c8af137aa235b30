//! Database models and queries

pub mod init;
pub mod models;
pub mod reviews;
pub mod tours;
pub mod users;

pub use init::*;
pub use models::*;
