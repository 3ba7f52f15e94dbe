//! Inbound request checks applied before any conversion work is done.

use crate::error::{Result, SearchError};

pub const MIN_QUERY_CHARS: usize = 3;
pub const MAX_QUERY_CHARS: usize = 500;

/// Trim the natural-language query and enforce its length bounds.
pub fn validate_search_request(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    let length = trimmed.chars().count();
    if !(MIN_QUERY_CHARS..=MAX_QUERY_CHARS).contains(&length) {
        return Err(SearchError::InvalidRequest(format!(
            "Query must be between {} and {} characters",
            MIN_QUERY_CHARS, MAX_QUERY_CHARS
        )));
    }
    Ok(trimmed)
}
