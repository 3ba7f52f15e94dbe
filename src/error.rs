use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("SQL rejected: {0}")]
    ValidationRejected(String),

    #[error("Expected {expected} parameters but got {supplied}")]
    ParameterMismatch { expected: usize, supplied: usize },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Enrichment error: {0}")]
    Enrichment(String),

    #[error("Rewrite error: {0}")]
    Rewrite(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SearchError>;
