//! Query Rewriter
//!
//! Heuristic transforms applied to validated SQL, in a fixed order:
//! name fuzzing, date normalization, then performance guardrails.
//!
//! Each transform returns a new string and leaves its input untouched. A
//! transform that errors is skipped and its input passed on unchanged, so a
//! rewrite can never fail a search. Every transform is a no-op on SQL that
//! already satisfies it, which makes the whole chain idempotent.

pub mod dates;
pub mod names;
pub mod performance;

use crate::error::Result;
use tracing::{debug, info, warn};

pub use dates::DateNormalization;
pub use names::NameFuzzing;
pub use performance::PerformanceGuardrails;

/// A single SQL rewrite step.
pub trait SqlTransform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrite `sql` given the user's original natural-language query.
    fn apply(&self, sql: &str, user_query: &str) -> Result<String>;
}

/// Result of a rewrite pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub sql: String,
    /// Names of the transforms that changed the SQL, in order.
    pub applied: Vec<&'static str>,
}

impl Rewrite {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

pub struct QueryRewriter {
    transforms: Vec<Box<dyn SqlTransform>>,
}

impl Default for QueryRewriter {
    fn default() -> Self {
        Self::new(vec![
            Box::new(NameFuzzing),
            Box::new(DateNormalization),
            Box::new(PerformanceGuardrails::default()),
        ])
    }
}

impl QueryRewriter {
    pub fn new(transforms: Vec<Box<dyn SqlTransform>>) -> Self {
        Self { transforms }
    }

    pub fn rewrite(&self, sql: &str, user_query: &str) -> Rewrite {
        let mut current = sql.to_string();
        let mut applied = Vec::new();

        for transform in &self.transforms {
            match transform.apply(&current, user_query) {
                Ok(next) if next != current => {
                    debug!(transform = transform.name(), before = %current, after = %next, "Rewrite applied");
                    applied.push(transform.name());
                    current = next;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(transform = transform.name(), error = %e, "Rewrite step failed, keeping input");
                }
            }
        }

        if !applied.is_empty() {
            info!(original = sql, rewritten = %current, ?applied, "Query enhancement applied");
        }

        Rewrite { sql: current, applied }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;

    struct Broken;

    impl SqlTransform for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn apply(&self, _sql: &str, _user_query: &str) -> Result<String> {
            Err(SearchError::Rewrite("boom".to_string()))
        }
    }

    #[test]
    fn test_failed_transform_passes_input_through() {
        let rewriter = QueryRewriter::new(vec![Box::new(Broken), Box::new(PerformanceGuardrails::default())]);
        let out = rewriter.rewrite("SELECT Id FROM dbo.Clients", "clients");
        assert_eq!(out.sql, "SELECT TOP 100 Id FROM dbo.Clients");
        assert_eq!(out.applied, vec!["performance_guardrails"]);
    }

    #[test]
    fn test_full_chain() {
        let rewriter = QueryRewriter::default();
        let out = rewriter.rewrite(
            "SELECT * FROM dbo.Candidates WHERE FirstName LIKE '%john%'",
            "find candidates named John",
        );
        assert_eq!(
            out.sql,
            "SELECT TOP 100 Id, FirstName, Surname, Email, CompanyId FROM dbo.Candidates \
             WHERE (FirstName LIKE '%john%' OR FirstName LIKE '%jon%' OR FirstName LIKE '%johnny%' \
             OR FirstName LIKE '%jonathan%') ORDER BY Surname, FirstName"
        );
        assert_eq!(out.applied, vec!["name_fuzzing", "performance_guardrails"]);
    }

    #[test]
    fn test_chain_is_idempotent() {
        let rewriter = QueryRewriter::default();
        let cases = [
            ("SELECT * FROM dbo.Candidates WHERE FirstName LIKE '%john%'", "find candidates named John"),
            ("SELECT * FROM dbo.Candidates WHERE Surname LIKE '%smyth%'", "search for people with surname smyth"),
            ("SELECT Id FROM dbo.Timesheets WHERE YEAR(TimesheetEndDate) = 2024", "timesheets in 2024"),
            ("SELECT Id, TimesheetEndDate FROM dbo.Timesheets", "timesheets for december 2023"),
            ("SELECT * FROM dbo.Timesheets WHERE StatusId = 5", "submitted timesheets"),
            ("SELECT DISTINCT ClientId FROM dbo.Bookings", "clients with bookings"),
            ("SELECT COUNT(*) FROM dbo.Bookings GROUP BY ClientId", "bookings per client"),
        ];
        for (sql, query) in cases {
            let once = rewriter.rewrite(sql, query);
            let twice = rewriter.rewrite(&once.sql, query);
            assert_eq!(once.sql, twice.sql, "not idempotent for {}", sql);
            assert!(!twice.changed(), "second pass changed {}", sql);
        }
    }
}
