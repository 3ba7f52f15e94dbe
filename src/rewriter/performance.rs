//! Performance guardrails
//!
//! Caps the row count, adds a sensible default ordering and narrows
//! `SELECT *` to a curated column list for the entities we know.

use super::SqlTransform;
use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;

pub const DEFAULT_ROW_LIMIT: u32 = 100;

/// Per-entity defaults keyed by table name.
#[derive(Debug, Clone, Copy)]
pub struct EntityDefaults {
    pub table: &'static str,
    pub order_by: &'static str,
    pub columns: Option<&'static str>,
}

pub const ENTITY_DEFAULTS: &[EntityDefaults] = &[
    EntityDefaults {
        table: "Timesheets",
        order_by: "TimesheetEndDate DESC",
        columns: Some("Id, TimesheetStartDate, TimesheetEndDate, StatusId, CandidateId"),
    },
    EntityDefaults {
        table: "Bookings",
        order_by: "StartDate DESC",
        columns: None,
    },
    EntityDefaults {
        table: "Candidates",
        order_by: "Surname, FirstName",
        columns: Some("Id, FirstName, Surname, Email, CompanyId"),
    },
];

lazy_static! {
    static ref TOP_CLAUSE: Regex = Regex::new(r"(?i)\bTOP\s*\(?\s*\d+").unwrap();
    static ref SELECT_HEAD: Regex = Regex::new(r"(?i)^(\s*SELECT\s+)(DISTINCT\s+)?").unwrap();
    static ref ORDER_BY: Regex = Regex::new(r"(?i)\bORDER\s+BY\b").unwrap();
    static ref SET_SHAPING: Regex =
        Regex::new(r"(?i)\bGROUP\s+BY\b|\bDISTINCT\b|\b(COUNT|SUM|AVG|MIN|MAX)\s*\(").unwrap();
    static ref FROM_TABLE: Regex =
        Regex::new(r"(?i)\bFROM\s+(?:\[?\w+\]?\.)?\[?(\w+)\]?").unwrap();
    static ref JOIN: Regex = Regex::new(r"(?i)\bJOIN\b").unwrap();
    static ref TOP_STAR: Regex = Regex::new(r"(?i)^(\s*SELECT\s+TOP\s+\d+\s+)\*(\s)").unwrap();
}

/// Defaults for the first table in the FROM clause, if it is a known entity.
pub fn detect_entity(sql: &str) -> Option<&'static EntityDefaults> {
    let caps = FROM_TABLE.captures(sql)?;
    let table = caps.get(1)?.as_str();
    ENTITY_DEFAULTS
        .iter()
        .find(|defaults| defaults.table.eq_ignore_ascii_case(table))
}

pub struct PerformanceGuardrails {
    pub row_limit: u32,
}

impl Default for PerformanceGuardrails {
    fn default() -> Self {
        Self {
            row_limit: DEFAULT_ROW_LIMIT,
        }
    }
}

impl PerformanceGuardrails {
    pub fn new(row_limit: u32) -> Self {
        Self { row_limit }
    }

    fn ensure_row_limit(&self, sql: &str) -> String {
        if TOP_CLAUSE.is_match(sql) {
            return sql.to_string();
        }
        let limit = format!("${{1}}${{2}}TOP {} ", self.row_limit);
        SELECT_HEAD.replace(sql, limit.as_str()).into_owned()
    }

    fn ensure_ordering(&self, sql: &str, entity: Option<&EntityDefaults>) -> String {
        // Ordering by a column outside the projection breaks aggregates and DISTINCT.
        if ORDER_BY.is_match(sql) || SET_SHAPING.is_match(sql) {
            return sql.to_string();
        }
        match entity {
            Some(defaults) => format!("{} ORDER BY {}", sql.trim_end(), defaults.order_by),
            None => sql.to_string(),
        }
    }

    fn narrow_projection(&self, sql: &str, entity: Option<&EntityDefaults>) -> String {
        let Some(columns) = entity.and_then(|defaults| defaults.columns) else {
            return sql.to_string();
        };
        if JOIN.is_match(sql) {
            return sql.to_string();
        }
        TOP_STAR
            .replace(sql, format!("${{1}}{}${{2}}", columns).as_str())
            .into_owned()
    }
}

impl SqlTransform for PerformanceGuardrails {
    fn name(&self) -> &'static str {
        "performance_guardrails"
    }

    fn apply(&self, sql: &str, _user_query: &str) -> Result<String> {
        let entity = detect_entity(sql);
        let sql = self.ensure_row_limit(sql);
        let sql = self.ensure_ordering(&sql, entity);
        Ok(self.narrow_projection(&sql, entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(sql: &str) -> String {
        PerformanceGuardrails::default().apply(sql, "").unwrap()
    }

    #[test]
    fn test_wildcard_replaced_for_candidates() {
        assert_eq!(
            guard("SELECT TOP 100 * FROM dbo.Candidates"),
            "SELECT TOP 100 Id, FirstName, Surname, Email, CompanyId FROM dbo.Candidates ORDER BY Surname, FirstName"
        );
    }

    #[test]
    fn test_limit_injected_after_select() {
        assert_eq!(
            guard("SELECT * FROM dbo.Timesheets WHERE StatusId = 5"),
            "SELECT TOP 100 Id, TimesheetStartDate, TimesheetEndDate, StatusId, CandidateId \
             FROM dbo.Timesheets WHERE StatusId = 5 ORDER BY TimesheetEndDate DESC"
        );
        assert_eq!(
            PerformanceGuardrails::new(25).apply("select Id from dbo.Clients", "").unwrap(),
            "select TOP 25 Id from dbo.Clients"
        );
    }

    #[test]
    fn test_existing_limit_and_order_kept() {
        let sql = "SELECT TOP 10 Id, StartDate FROM dbo.Bookings ORDER BY Id";
        assert_eq!(guard(sql), sql);
    }

    #[test]
    fn test_join_keeps_wildcard() {
        assert_eq!(
            guard("SELECT * FROM dbo.Candidates c JOIN dbo.Bookings b ON b.CandidateId = c.Id"),
            "SELECT TOP 100 * FROM dbo.Candidates c JOIN dbo.Bookings b ON b.CandidateId = c.Id \
             ORDER BY Surname, FirstName"
        );
    }

    #[test]
    fn test_distinct_and_aggregates_not_reordered() {
        assert_eq!(
            guard("SELECT DISTINCT ClientId FROM dbo.Bookings"),
            "SELECT DISTINCT TOP 100 ClientId FROM dbo.Bookings"
        );
        assert_eq!(
            guard("SELECT COUNT(*) AS Total FROM dbo.Timesheets"),
            "SELECT TOP 100 COUNT(*) AS Total FROM dbo.Timesheets"
        );
    }

    #[test]
    fn test_entity_detection() {
        assert_eq!(detect_entity("SELECT 1 FROM [dbo].[Bookings]").map(|d| d.table), Some("Bookings"));
        assert_eq!(detect_entity("select 1 from timesheets").map(|d| d.table), Some("Timesheets"));
        assert!(detect_entity("SELECT 1 FROM dbo.Clients").is_none());
    }
}
