//! PostgreSQL query executor
//!
//! Generated statements use `@pN` placeholders and `TOP n` row limits. They
//! are translated to `$N` binds and a trailing `LIMIT n` before dispatch. A
//! leading `SET TRANSACTION ...;` directive is peeled off and run as its own
//! statement at the start of the read transaction.

use crate::error::{Result, SearchError};
use crate::execution::{QueryExecutor, Row, SqlParam};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};
use tracing::{debug, info};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"@p(\d+)\b").unwrap();
    static ref LEADING_TOP: Regex =
        Regex::new(r"(?i)^(\s*SELECT\s+(?:DISTINCT\s+)?)TOP\s*\(?\s*(\d+)\s*\)?\s+").unwrap();
    static ref DIRECTIVE: Regex =
        Regex::new(r"(?is)^\s*(SET\s+TRANSACTION\s+ISOLATION\s+LEVEL\s+[^;]+);\s*").unwrap();
}

/// Split a leading transaction directive from the statement body.
pub fn split_directive(sql: &str) -> (Option<&str>, &str) {
    match DIRECTIVE.captures(sql) {
        Some(caps) => {
            let directive = caps.get(1).map(|m| m.as_str().trim());
            let body_start = caps.get(0).map_or(0, |m| m.end());
            (directive, &sql[body_start..])
        }
        None => (None, sql),
    }
}

/// Rewrite a generated statement into PostgreSQL syntax.
pub fn to_postgres(sql: &str) -> String {
    let numbered = PLACEHOLDER.replace_all(sql, |caps: &Captures| {
        let index: usize = caps[1].parse().unwrap_or(0);
        format!("${}", index + 1)
    });

    match LEADING_TOP.captures(&numbered) {
        Some(caps) => {
            let limit = caps[2].to_string();
            let body = LEADING_TOP.replace(&numbered, "$1");
            format!("{} LIMIT {}", body.trim_end(), limit)
        }
        None => numbered.into_owned(),
    }
}

/// Number of leading parameters the statement actually references.
fn referenced_params(sql: &str, supplied: usize) -> usize {
    PLACEHOLDER
        .captures_iter(sql)
        .filter_map(|caps| caps[1].parse::<usize>().ok())
        .map(|index| index + 1)
        .max()
        .unwrap_or(0)
        .min(supplied)
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &SqlParam,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(sqlx::types::Json(other.clone())),
    }
}

fn decode_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    fn get<'r, T>(row: &'r PgRow, index: usize) -> Option<T>
    where
        T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    {
        row.try_get::<Option<T>, _>(index).ok().flatten()
    }

    match type_name {
        "BOOL" => get::<bool>(row, index).map(Value::from),
        "INT2" => get::<i16>(row, index).map(Value::from),
        "INT4" => get::<i32>(row, index).map(Value::from),
        "INT8" => get::<i64>(row, index).map(Value::from),
        "FLOAT4" => get::<f32>(row, index).map(Value::from),
        "FLOAT8" => get::<f64>(row, index).map(Value::from),
        "DATE" => get::<chrono::NaiveDate>(row, index).map(|d| Value::from(d.to_string())),
        "TIMESTAMP" => get::<chrono::NaiveDateTime>(row, index).map(|d| Value::from(d.to_string())),
        "TIMESTAMPTZ" => {
            get::<chrono::DateTime<chrono::Utc>>(row, index).map(|d| Value::from(d.to_rfc3339()))
        }
        "UUID" => get::<uuid::Uuid>(row, index).map(|u| Value::from(u.to_string())),
        "JSON" | "JSONB" => get::<Value>(row, index),
        _ => get::<String>(row, index).map(Value::from),
    }
    .unwrap_or(Value::Null)
}

fn decode_row(row: &PgRow) -> Row {
    let mut out = Row::new();
    for column in row.columns() {
        let value = decode_value(row, column.ordinal(), column.type_info().name());
        out.insert(column.name().to_string(), value);
    }
    out
}

pub struct PgQueryExecutor {
    pool: PgPool,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>> {
        let (directive, body) = split_directive(sql);
        let statement = to_postgres(body);
        let bound = referenced_params(body, params.len());
        debug!(%statement, params = bound, "Executing statement");

        let mut tx = self.pool.begin().await?;
        if let Some(directive) = directive {
            sqlx::query(directive).execute(&mut *tx).await?;
        }

        let mut query = sqlx::query(&statement);
        for param in &params[..bound] {
            query = bind_param(query, param);
        }

        let rows = query
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| SearchError::Execution(e.to_string()))?;
        tx.commit().await?;

        info!(rows = rows.len(), "Statement executed");
        Ok(rows.iter().map(decode_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_directive() {
        let sql = "SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED;\nSELECT Id FROM dbo.Timesheets";
        let (directive, body) = split_directive(sql);
        assert_eq!(directive, Some("SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED"));
        assert_eq!(body, "SELECT Id FROM dbo.Timesheets");

        let (directive, body) = split_directive("SELECT 1");
        assert_eq!(directive, None);
        assert_eq!(body, "SELECT 1");
    }

    #[test]
    fn test_placeholders_become_numbered_binds() {
        assert_eq!(
            to_postgres("SELECT Id FROM dbo.Candidates WHERE FirstName = @p0 AND Surname = @p1"),
            "SELECT Id FROM dbo.Candidates WHERE FirstName = $1 AND Surname = $2"
        );
    }

    #[test]
    fn test_top_becomes_limit() {
        assert_eq!(
            to_postgres("SELECT TOP 100 Id, Surname FROM dbo.Candidates ORDER BY Surname"),
            "SELECT Id, Surname FROM dbo.Candidates ORDER BY Surname LIMIT 100"
        );
        assert_eq!(
            to_postgres("select distinct top (5) Surname from dbo.Candidates"),
            "select distinct Surname from dbo.Candidates LIMIT 5"
        );
        assert_eq!(
            to_postgres("SELECT COUNT(*) FROM dbo.Timesheets"),
            "SELECT COUNT(*) FROM dbo.Timesheets"
        );
    }

    #[test]
    fn test_referenced_params() {
        assert_eq!(referenced_params("SELECT 1", 3), 0);
        assert_eq!(referenced_params("SELECT Id FROM x WHERE a = @p0 AND b = @p1", 3), 2);
        assert_eq!(referenced_params("SELECT Id FROM x WHERE a = @p1", 1), 1);
    }
}
