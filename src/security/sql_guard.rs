//! SQL Guard
//!
//! Read-only allow-list applied to every candidate statement before it is
//! executed. This is a substring scan, not a parser: a forbidden token inside
//! a string literal is still rejected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Statements longer than this are rejected outright.
pub const MAX_SQL_LENGTH: usize = 5000;

/// Tokens that may never appear anywhere in a candidate statement (matched
/// against the lowercased, trimmed text).
pub const FORBIDDEN_TOKENS: &[&str] = &[
    "update ", "delete ", "insert ", "merge ", "drop ", "alter ",
    "truncate ", "exec ", "execute ", "sp_", "xp_", "--", "/*",
    "*/", ";", "grant ", "revoke ", "create ", "backup ", "restore ",
];

/// The first rule a statement broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    NotSelect,
    /// Every forbidden token present, in list order.
    ForbiddenTokens(Vec<&'static str>),
    SelectInto,
    TooLong { length: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NotSelect => write!(f, "Only SELECT statements are allowed"),
            Violation::ForbiddenTokens(tokens) => {
                let names: Vec<&str> = tokens.iter().map(|t| t.trim()).collect();
                write!(f, "Forbidden keyword detected: {}", names.join(", "))
            }
            Violation::SelectInto => write!(f, "SELECT INTO statements are not allowed"),
            Violation::TooLong { length } => {
                write!(f, "Query too long ({} characters, max {})", length, MAX_SQL_LENGTH)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl ValidationVerdict {
    pub fn allowed() -> Self {
        Self { allowed: true, reason: None }
    }

    pub fn rejected(violation: &Violation) -> Self {
        Self {
            allowed: false,
            reason: Some(violation.to_string()),
        }
    }
}

/// Decide whether `sql` may be executed.
pub fn validate(sql: &str) -> ValidationVerdict {
    match check(sql) {
        Ok(()) => ValidationVerdict::allowed(),
        Err(violation) => ValidationVerdict::rejected(&violation),
    }
}

/// Same policy as [`validate`], returning the violated rule itself.
pub fn check(sql: &str) -> std::result::Result<(), Violation> {
    let lower = sql.to_lowercase();
    let lower = lower.trim();

    if !lower.starts_with("select") {
        return Err(Violation::NotSelect);
    }

    let found: Vec<&'static str> = FORBIDDEN_TOKENS
        .iter()
        .copied()
        .filter(|token| lower.contains(token))
        .collect();
    if !found.is_empty() {
        return Err(Violation::ForbiddenTokens(found));
    }

    if lower.contains(" into ") {
        return Err(Violation::SelectInto);
    }

    let length = sql.chars().count();
    if length > MAX_SQL_LENGTH {
        return Err(Violation::TooLong { length });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_select() {
        let verdict = validate("SELECT TOP 100 * FROM dbo.Candidates");
        assert!(verdict.allowed);
        assert_eq!(verdict.reason, None);

        assert!(validate("  select Id, FirstName from dbo.Candidates where Surname like '%smith%'  ").allowed);
    }

    #[test]
    fn test_rejects_non_select() {
        for sql in [
            "UPDATE dbo.Timesheets SET StatusId = 4",
            "with x as (select 1) select * from x",
            "",
            "   ",
            "EXEC sp_who",
        ] {
            assert_eq!(check(sql), Err(Violation::NotSelect), "{}", sql);
        }
    }

    #[test]
    fn test_rejects_stacked_statement() {
        let verdict = validate("SELECT Id FROM dbo.Timesheets; DROP TABLE dbo.Timesheets");
        assert!(!verdict.allowed);
        let reason = verdict.reason.unwrap();
        assert!(reason.contains("drop"), "{}", reason);
        assert!(reason.contains(';'), "{}", reason);
    }

    #[test]
    fn test_every_forbidden_token_rejects() {
        for token in FORBIDDEN_TOKENS {
            let sql = format!("SELECT Id FROM dbo.Bookings WHERE x = 1 {}y", token.to_uppercase());
            match check(&sql) {
                Err(Violation::ForbiddenTokens(found)) => assert!(found.contains(token), "{}", sql),
                other => panic!("expected rejection for {:?}, got {:?}", token, other),
            }
        }
    }

    #[test]
    fn test_forbidden_token_inside_literal_still_rejected() {
        let verdict = validate("SELECT Id FROM dbo.Clients WHERE Notes LIKE '%please update %'");
        assert!(!verdict.allowed);
    }

    #[test]
    fn test_rejects_select_into() {
        assert_eq!(
            check("SELECT * INTO dbo.Backup FROM dbo.Candidates"),
            Err(Violation::SelectInto)
        );
    }

    #[test]
    fn test_rejects_overlong_sql() {
        let sql = format!("SELECT Id FROM dbo.Candidates WHERE FirstName IN ({})", "'a',".repeat(1300));
        assert!(matches!(check(&sql), Err(Violation::TooLong { .. })));

        let at_limit = format!("SELECT {}", "x".repeat(MAX_SQL_LENGTH - 7));
        assert_eq!(at_limit.len(), MAX_SQL_LENGTH);
        assert!(validate(&at_limit).allowed);
    }
}
