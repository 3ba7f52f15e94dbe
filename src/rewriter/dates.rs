//! Date normalization
//!
//! Turns `YEAR(col) = yyyy` into an index-friendly half-open range and, when
//! the user names a month and year, adds a month range on a known date column.

use super::SqlTransform;
use crate::error::{Result, SearchError};
use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::info;

/// Columns that may receive an injected month range, in preference order.
pub const DATE_COLUMNS: &[&str] = &[
    "TimesheetEndDate",
    "TimesheetStartDate",
    "StartDate",
    "EndDate",
    "Date",
];

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

lazy_static! {
    static ref YEAR_TOKEN: Regex = Regex::new(r"\b(20\d{2})\b").unwrap();
    static ref YEAR_FUNCTION: Regex =
        Regex::new(r"(?i)YEAR\(\s*((?:\w+\.)*\w+)\s*\)\s*=\s*(\d{4})").unwrap();
    static ref MONTH_YEAR: Regex = Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{4})\b"
    )
    .unwrap();
    static ref WHERE_KEYWORD: Regex = Regex::new(r"(?i)\bWHERE\b").unwrap();
    static ref TRAILING_CLAUSE: Regex = Regex::new(r"(?i)\b(GROUP\s+BY|ORDER\s+BY|HAVING)\b").unwrap();
    static ref COLUMN_PATTERNS: Vec<(&'static str, Regex, Regex)> = DATE_COLUMNS
        .iter()
        .map(|column| {
            let referenced = Regex::new(&format!(r"\b{}\b", column)).unwrap();
            let constrained = Regex::new(&format!(r"(?is)\b{}\b.*(BETWEEN|>=|YEAR)", column)).unwrap();
            (*column, referenced, constrained)
        })
        .collect();
}

/// Half-open `[start, end)` bounds of a calendar month.
pub fn month_range(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| SearchError::Rewrite(format!("invalid month {}-{}", year, month)))?;
    let (next_year, next_month) = if start.month() == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(|| SearchError::Rewrite(format!("invalid month {}-{}", next_year, next_month)))?;
    Ok((start, end))
}

fn range_condition(column: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{col} >= '{}' AND {col} < '{}'",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d"),
        col = column
    )
}

fn parse_year(raw: &str) -> Result<i32> {
    raw.parse()
        .map_err(|_| SearchError::Rewrite(format!("invalid year '{}'", raw)))
}

fn rewrite_year_functions(sql: &str) -> Result<String> {
    let mut failure = None;
    let rewritten = YEAR_FUNCTION.replace_all(sql, |caps: &Captures| {
        let column = &caps[1];
        let range = parse_year(&caps[2]).and_then(|year| {
            let start = NaiveDate::from_ymd_opt(year, 1, 1);
            let end = NaiveDate::from_ymd_opt(year + 1, 1, 1);
            start
                .zip(end)
                .ok_or_else(|| SearchError::Rewrite(format!("invalid year {}", year)))
        });
        match range {
            Ok((start, end)) => range_condition(column, start, end),
            Err(e) => {
                failure = Some(e);
                caps[0].to_string()
            }
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(rewritten.into_owned()),
    }
}

/// AND `condition` onto the WHERE clause, creating one ahead of any trailing
/// GROUP BY / ORDER BY / HAVING when the statement has none. An existing
/// predicate is parenthesized so the condition covers every OR branch.
fn add_where_condition(sql: &str, condition: &str) -> String {
    if let Some(m) = WHERE_KEYWORD.find(sql) {
        let rest = &sql[m.end()..];
        let (predicate, tail) = match TRAILING_CLAUSE.find(rest) {
            Some(clause) => (&rest[..clause.start()], &rest[clause.start()..]),
            None => (rest, ""),
        };
        let mut out = format!("{}WHERE {} AND ({})", &sql[..m.start()], condition, predicate.trim());
        if !tail.is_empty() {
            out.push(' ');
            out.push_str(tail);
        }
        return out;
    }
    match TRAILING_CLAUSE.find(sql) {
        Some(m) => format!(
            "{} WHERE {} {}",
            sql[..m.start()].trim_end(),
            condition,
            &sql[m.start()..]
        ),
        None => format!("{} WHERE {}", sql.trim_end(), condition),
    }
}

fn inject_month_range(sql: &str, user_query: &str) -> Result<String> {
    let Some(caps) = MONTH_YEAR.captures(user_query) else {
        return Ok(sql.to_string());
    };
    let month_name = caps[1].to_lowercase();
    let month = MONTHS
        .iter()
        .position(|m| *m == month_name)
        .map(|idx| idx as u32 + 1)
        .ok_or_else(|| SearchError::Rewrite(format!("unknown month '{}'", month_name)))?;
    let year = parse_year(&caps[2])?;

    let referenced: Vec<&(&'static str, Regex, Regex)> = COLUMN_PATTERNS
        .iter()
        .filter(|(_, referenced, _)| referenced.is_match(sql))
        .collect();
    if referenced.iter().any(|(_, _, constrained)| constrained.is_match(sql)) {
        return Ok(sql.to_string());
    }
    let Some((column, _, _)) = referenced.first() else {
        return Ok(sql.to_string());
    };

    let (start, end) = month_range(year, month)?;
    let condition = range_condition(column, start, end);
    info!(column, %condition, "Added month range from query");
    Ok(add_where_condition(sql, &condition))
}

pub struct DateNormalization;

impl SqlTransform for DateNormalization {
    fn name(&self) -> &'static str {
        "date_normalization"
    }

    fn apply(&self, sql: &str, user_query: &str) -> Result<String> {
        if !YEAR_TOKEN.is_match(user_query) {
            return Ok(sql.to_string());
        }
        let sql = rewrite_year_functions(sql)?;
        inject_month_range(&sql, user_query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(sql: &str, query: &str) -> String {
        DateNormalization.apply(sql, query).unwrap()
    }

    #[test]
    fn test_year_function_becomes_range() {
        let out = normalize(
            "SELECT Id FROM dbo.Timesheets WHERE YEAR(TimesheetEndDate) = 2024 AND StatusId = 5",
            "submitted timesheets in 2024",
        );
        assert_eq!(
            out,
            "SELECT Id FROM dbo.Timesheets WHERE TimesheetEndDate >= '2024-01-01' \
             AND TimesheetEndDate < '2025-01-01' AND StatusId = 5"
        );
    }

    #[test]
    fn test_no_year_in_query_is_noop() {
        let sql = "SELECT Id FROM dbo.Timesheets WHERE YEAR(TimesheetEndDate) = 2024";
        assert_eq!(normalize(sql, "timesheets this year"), sql);
    }

    #[test]
    fn test_month_range_added_to_existing_where() {
        let out = normalize(
            "SELECT Id, StartDate FROM dbo.Bookings WHERE WorkStatusId = 2",
            "active bookings starting march 2024",
        );
        assert_eq!(
            out,
            "SELECT Id, StartDate FROM dbo.Bookings WHERE StartDate >= '2024-03-01' \
             AND StartDate < '2024-04-01' AND (WorkStatusId = 2)"
        );
    }

    #[test]
    fn test_month_range_covers_every_or_branch() {
        let out = normalize(
            "SELECT Id, StartDate FROM dbo.Bookings WHERE WorkStatusId = 2 OR WorkStatusId = 4 ORDER BY Id",
            "bookings in march 2024",
        );
        assert_eq!(
            out,
            "SELECT Id, StartDate FROM dbo.Bookings WHERE StartDate >= '2024-03-01' \
             AND StartDate < '2024-04-01' AND (WorkStatusId = 2 OR WorkStatusId = 4) ORDER BY Id"
        );
    }

    #[test]
    fn test_december_rolls_over_year() {
        let out = normalize(
            "SELECT Id, TimesheetEndDate FROM dbo.Timesheets ORDER BY TimesheetEndDate DESC",
            "timesheets for December 2023",
        );
        assert_eq!(
            out,
            "SELECT Id, TimesheetEndDate FROM dbo.Timesheets WHERE TimesheetEndDate >= '2023-12-01' \
             AND TimesheetEndDate < '2024-01-01' ORDER BY TimesheetEndDate DESC"
        );
    }

    #[test]
    fn test_existing_date_condition_blocks_injection() {
        let sql = "SELECT Id FROM dbo.Bookings WHERE StartDate BETWEEN '2024-01-01' AND '2024-06-30'";
        assert_eq!(normalize(sql, "bookings in march 2024"), sql);
    }

    #[test]
    fn test_only_whole_column_names_count() {
        let sql = "SELECT Id, CreatedDate FROM dbo.Clients";
        assert_eq!(normalize(sql, "clients created in may 2024"), sql);
    }

    #[test]
    fn test_month_range_bounds() {
        let (start, end) = month_range(2024, 2).unwrap();
        assert_eq!(start.to_string(), "2024-02-01");
        assert_eq!(end.to_string(), "2024-03-01");
        assert!(month_range(2024, 13).is_err());
    }
}
