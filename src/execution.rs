//! Execution Contracts
//!
//! The search pipeline talks to three out-of-process collaborators: the
//! natural-language-to-SQL converter, the database that runs validated
//! statements, and the search history store. Each is a trait so the pipeline
//! can be exercised without a live LLM or database.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One result row, columns in select-list order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Positional parameter value bound to `@p0`, `@p1`, ...
pub type SqlParam = serde_json::Value;

/// Turns a natural-language request into a candidate SQL string.
#[async_trait]
pub trait SqlConverter: Send + Sync {
    async fn convert(&self, natural_language: &str) -> Result<String>;
}

/// Runs a statement that has already passed validation.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Parameters are bound positionally, never spliced into the SQL text.
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>>;
}

/// A completed search, as recorded in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub query_text: String,
    pub executed_sql: String,
    pub result_count: usize,
    pub duration_ms: u64,
    pub success: bool,
}

/// Past searches: recording and prefix suggestions.
#[async_trait]
pub trait SearchHistory: Send + Sync {
    async fn record(&self, record: &SearchRecord) -> Result<()>;

    /// Previously successful queries starting with `partial`, most popular first.
    async fn suggestions(&self, partial: &str, limit: usize) -> Result<Vec<String>>;
}
