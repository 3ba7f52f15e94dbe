//! Search history repository for storing completed searches

use crate::error::Result;
use crate::execution::{SearchHistory, SearchRecord};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

pub struct SearchHistoryRepository {
    pool: PgPool,
}

impl SearchHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn save_search(&self, record: &SearchRecord) -> Result<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO search_history (id, query_text, executed_sql, result_count, duration_ms, success)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&record.query_text)
        .bind(&record.executed_sql)
        .bind(record.result_count as i64)
        .bind(record.duration_ms as i64)
        .bind(record.success)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }
}

/// Escape LIKE metacharacters so user text matches literally.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl SearchHistory for SearchHistoryRepository {
    async fn record(&self, record: &SearchRecord) -> Result<()> {
        self.save_search(record).await.map(|_| ())
    }

    async fn suggestions(&self, partial: &str, limit: usize) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT MIN(query_text) AS query_text
            FROM search_history
            WHERE success = TRUE AND query_text ILIKE $1 ESCAPE '\'
            GROUP BY lower(query_text)
            ORDER BY COUNT(*) DESC, MAX(created_at) DESC
            LIMIT $2
            "#,
        )
        .bind(format!("{}%", escape_like(partial)))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(text,)| text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("show"), "show");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
