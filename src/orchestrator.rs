//! Search Orchestrator
//!
//! Drives one natural-language search through a linear pipeline:
//!
//! ```text
//! REQUEST_CHECK → CONVERTING → VALIDATING → RECONCILING_PARAMETERS → REWRITING
//!   → { EXECUTING_WITH_PARAMETERS | EXECUTING_PARAMETERLESS } → ENRICHING → DONE
//! ```
//!
//! Any state may end in `FAILED(step)`. The safety validator runs on the exact
//! statement body before every execution, including the parameterless fallback.

use crate::enricher::ResultEnricher;
use crate::error::SearchError;
use crate::execution::{QueryExecutor, Row, SearchHistory, SearchRecord, SqlConverter, SqlParam};
use crate::parameters::{reconcile, strip_placeholders, Reconciliation};
use crate::rewriter::QueryRewriter;
use crate::security::{validate, validate_search_request};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Prepended to every executed statement.
pub const ISOLATION_PREFIX: &str = "SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED;\n";

pub const PARAMETERLESS_WARNING: &str = "Query parameters were automatically handled";

/// Minimum partial text length before suggestions are looked up.
pub const MIN_SUGGESTION_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStep {
    RequestValidation,
    NlpConversion,
    SqlValidation,
    ParameterMismatch,
    DatabaseExecution,
}

impl SearchStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStep::RequestValidation => "REQUEST_VALIDATION",
            SearchStep::NlpConversion => "NLP_CONVERSION",
            SearchStep::SqlValidation => "SQL_VALIDATION",
            SearchStep::ParameterMismatch => "PARAMETER_MISMATCH",
            SearchStep::DatabaseExecution => "DATABASE_EXECUTION",
        }
    }

    /// Headline shown to the user for a failure at this step.
    pub fn error_label(&self) -> &'static str {
        match self {
            SearchStep::RequestValidation => "Invalid search request",
            SearchStep::NlpConversion => "Failed to understand the query",
            SearchStep::SqlValidation => "Generated query failed security validation",
            SearchStep::ParameterMismatch => "Query requires specific parameters",
            SearchStep::DatabaseExecution => "Database query failed",
        }
    }

    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            SearchStep::RequestValidation => &["Query must be between 3 and 500 characters"],
            SearchStep::NlpConversion => &[
                "Try rephrasing your query",
                "Be more specific about what data you want",
                "Use terms like \"show\", \"find\", \"list\" to start your query",
            ],
            SearchStep::SqlValidation => &[
                "Try a simpler query",
                "Avoid complex operations",
                "Use basic search terms",
            ],
            SearchStep::ParameterMismatch => &[
                "Try a more general query without specific values",
                "Rephrase to avoid filtering by specific names or IDs",
            ],
            SearchStep::DatabaseExecution => &[
                "The query might reference non-existent tables or columns",
                "Try a simpler query",
                "Check if the data you're looking for exists",
            ],
        }
    }
}

impl fmt::Display for SearchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    RequestCheck,
    Converting,
    Validating,
    ReconcilingParameters,
    Rewriting,
    ExecutingWithParameters,
    ExecutingParameterless,
    Enriching,
    Done,
    Failed(SearchStep),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// SQL as produced by the converter.
    pub sql: String,
    /// Statement actually run, when it differs from `sql`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_sql: Option<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFailure {
    pub error_kind: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    pub step: SearchStep,
    pub suggestions: Vec<String>,
}

impl SearchFailure {
    pub fn new(step: SearchStep, detail: impl Into<String>, sql: Option<String>) -> Self {
        Self {
            error_kind: step.error_label().to_string(),
            detail: detail.into(),
            sql,
            step,
            suggestions: step.suggestions().iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl fmt::Display for SearchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.error_kind, self.step, self.detail)
    }
}

impl std::error::Error for SearchFailure {}

/// Outcome of a run plus every state it passed through.
#[derive(Debug)]
pub struct SearchRun {
    pub states: Vec<PipelineState>,
    pub result: Result<SearchResponse, SearchFailure>,
}

struct Trace {
    states: Vec<PipelineState>,
}

impl Trace {
    fn enter(&mut self, state: PipelineState) {
        debug!(?state, "Pipeline transition");
        self.states.push(state);
    }

    fn fail(&mut self, step: SearchStep, detail: impl Into<String>, sql: Option<String>) -> SearchFailure {
        let failure = SearchFailure::new(step, detail, sql);
        warn!(step = step.as_str(), detail = %failure.detail, "Search failed");
        self.enter(PipelineState::Failed(step));
        failure
    }
}

pub struct SearchOrchestrator {
    converter: Arc<dyn SqlConverter>,
    executor: Arc<dyn QueryExecutor>,
    rewriter: QueryRewriter,
    enricher: Option<ResultEnricher>,
    history: Option<Arc<dyn SearchHistory>>,
}

impl SearchOrchestrator {
    pub fn new(converter: Arc<dyn SqlConverter>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            converter,
            executor,
            rewriter: QueryRewriter::default(),
            enricher: None,
            history: None,
        }
    }

    pub fn with_rewriter(mut self, rewriter: QueryRewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn with_enricher(mut self, enricher: ResultEnricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn SearchHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub async fn search(
        &self,
        natural_language: &str,
        params: &[SqlParam],
    ) -> Result<SearchResponse, SearchFailure> {
        self.search_traced(natural_language, params).await.result
    }

    pub async fn search_traced(&self, natural_language: &str, params: &[SqlParam]) -> SearchRun {
        let mut trace = Trace { states: Vec::new() };
        let result = self.run(&mut trace, natural_language, params).await;
        SearchRun {
            states: trace.states,
            result,
        }
    }

    async fn run(
        &self,
        trace: &mut Trace,
        natural_language: &str,
        params: &[SqlParam],
    ) -> Result<SearchResponse, SearchFailure> {
        let started = Instant::now();

        trace.enter(PipelineState::RequestCheck);
        let query = validate_search_request(natural_language)
            .map_err(|e| trace.fail(SearchStep::RequestValidation, e.to_string(), None))?;

        trace.enter(PipelineState::Converting);
        let sql = self
            .converter
            .convert(query)
            .await
            .map_err(|e| trace.fail(SearchStep::NlpConversion, e.to_string(), None))?;

        trace.enter(PipelineState::Validating);
        let verdict = validate(&sql);
        if !verdict.allowed {
            let reason = verdict.reason.unwrap_or_default();
            return Err(trace.fail(SearchStep::SqlValidation, reason, Some(sql)));
        }

        trace.enter(PipelineState::ReconcilingParameters);
        let reconciliation = reconcile(&sql, params.len());

        trace.enter(PipelineState::Rewriting);
        let rewrite = self.rewriter.rewrite(&sql, query);
        let candidate = if !rewrite.changed() {
            sql.clone()
        } else if validate(&rewrite.sql).allowed {
            info!(applied = ?rewrite.applied, "Using rewritten SQL");
            rewrite.sql
        } else {
            warn!(applied = ?rewrite.applied, "Rewritten SQL failed validation, using original");
            sql.clone()
        };

        let (statement, rows, warning) = match reconciliation {
            Reconciliation::Sufficient => {
                trace.enter(PipelineState::ExecutingWithParameters);
                let rows = self
                    .execute_guarded(&candidate, params)
                    .await
                    .map_err(|e| match e {
                        SearchError::ValidationRejected(reason) => {
                            trace.fail(SearchStep::SqlValidation, reason, Some(sql.clone()))
                        }
                        other => trace.fail(
                            SearchStep::DatabaseExecution,
                            other.to_string(),
                            Some(sql.clone()),
                        ),
                    })?;
                (candidate, rows, None)
            }
            Reconciliation::Insufficient { expected, supplied } => {
                trace.enter(PipelineState::ExecutingParameterless);
                warn!(expected, supplied, "Insufficient parameters, executing without them");
                let parameterless = strip_placeholders(&candidate);
                let rows = self
                    .execute_guarded(&parameterless, &[])
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Parameterless execution failed");
                        match e {
                            SearchError::ValidationRejected(reason) => {
                                trace.fail(SearchStep::SqlValidation, reason, Some(sql.clone()))
                            }
                            _ => trace.fail(
                                SearchStep::ParameterMismatch,
                                SearchError::ParameterMismatch { expected, supplied }.to_string(),
                                Some(sql.clone()),
                            ),
                        }
                    })?;
                (parameterless, rows, Some(PARAMETERLESS_WARNING.to_string()))
            }
        };

        trace.enter(PipelineState::Enriching);
        let rows = match &self.enricher {
            Some(enricher) => enricher.enrich(rows).await,
            None => rows,
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let row_count = rows.len();
        self.record(query, &statement, row_count, duration_ms).await;

        trace.enter(PipelineState::Done);
        info!(rows = row_count, duration_ms, "Search completed");

        let executed_sql = (statement != sql).then_some(statement);
        Ok(SearchResponse {
            sql,
            executed_sql,
            rows,
            row_count,
            duration_ms,
            warning,
        })
    }

    /// Validate `body`, then hand it to the executor behind the isolation directive.
    async fn execute_guarded(&self, body: &str, params: &[SqlParam]) -> crate::error::Result<Vec<Row>> {
        let verdict = validate(body);
        if !verdict.allowed {
            return Err(SearchError::ValidationRejected(verdict.reason.unwrap_or_default()));
        }
        let statement = format!("{}{}", ISOLATION_PREFIX, body);
        self.executor.execute(&statement, params).await
    }

    async fn record(&self, query: &str, statement: &str, result_count: usize, duration_ms: u64) {
        let Some(history) = &self.history else {
            return;
        };
        let record = SearchRecord {
            query_text: query.to_string(),
            executed_sql: statement.to_string(),
            result_count,
            duration_ms,
            success: true,
        };
        if let Err(e) = history.record(&record).await {
            warn!(error = %e, "Failed to record search history");
        }
    }

    /// Previously successful searches starting with `partial`. Never fails.
    pub async fn suggest(&self, partial: &str, max_results: usize) -> Vec<String> {
        match &self.history {
            Some(history) => suggest_from(history.as_ref(), partial, max_results).await,
            None => Vec::new(),
        }
    }
}

/// Suggestion lookup against a history store; errors degrade to an empty list.
pub async fn suggest_from(history: &dyn SearchHistory, partial: &str, max_results: usize) -> Vec<String> {
    let partial = partial.trim();
    if partial.chars().count() < MIN_SUGGESTION_CHARS || max_results == 0 {
        return Vec::new();
    }
    match history.suggestions(partial, max_results).await {
        Ok(mut suggestions) => {
            suggestions.truncate(max_results);
            suggestions
        }
        Err(e) => {
            warn!(partial, error = %e, "Suggestion lookup failed");
            Vec::new()
        }
    }
}
