pub mod config;
pub mod db;
pub mod enricher;
pub mod enum_cache;
pub mod error;
pub mod execution;
pub mod llm;
pub mod orchestrator;
pub mod parameters;
pub mod rewriter;
pub mod security;
pub mod status_terms;

pub use config::SearchConfig;
pub use enricher::ResultEnricher;
pub use enum_cache::EnumCache;
pub use error::{Result, SearchError};
pub use execution::{QueryExecutor, Row, SearchHistory, SearchRecord, SqlConverter, SqlParam};
pub use llm::LlmClient;
pub use orchestrator::{SearchFailure, SearchOrchestrator, SearchResponse, SearchStep};
pub use rewriter::QueryRewriter;
