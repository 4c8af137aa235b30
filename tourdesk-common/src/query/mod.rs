//! Query translation shared by every list and read endpoint
//!
//! Client query parameters flow through [`filter::translate`] into a
//! [`filter::Filter`], then [`pipeline::build_query`] composes filter, sort,
//! projection and page window into one [`pipeline::ExecutableRead`].

pub mod filter;
pub mod pipeline;
pub mod schema;

pub use filter::{translate, Comparison, Filter, FilterValue, Predicate, RESERVED_PARAMS};
pub use pipeline::{build_query, BaseRead, ExecutableRead, PageWindow, QueryParams, SortKey};
pub use schema::{FieldDef, FieldType, ResourceSchema, REVIEWS, TOURS, USERS};
