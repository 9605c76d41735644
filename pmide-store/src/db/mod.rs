//! Database access for the store service
//!
//! One module per entity. Functions take the pool explicitly and return
//! `pmide_common::Result`; handlers map errors to HTTP statuses.

pub mod conversations;
pub mod documents;
pub mod folders;
pub mod frameworks;
pub mod outputs;
pub mod projects;
pub mod prompts;
pub mod schema;
pub mod search;
pub mod settings;
pub mod usage;

pub use schema::init_database;

use pmide_common::{Error, Result};

/// Reject blank names with a field-specific message
pub(crate) fn require_name(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{} cannot be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Map an empty or whitespace-only optional string to `None`
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
