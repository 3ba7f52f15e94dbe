//! Enum mapping repository backing the lookup cache

use crate::enum_cache::{EnumMappingEntry, EnumStore};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::PgPool;

pub struct PgEnumStore {
    pool: PgPool,
}

impl PgEnumStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnumStore for PgEnumStore {
    async fn load_active(&self) -> Result<Vec<EnumMappingEntry>> {
        let rows: Vec<(String, String, i64, String)> = sqlx::query_as(
            r#"
            SELECT entity_name, field_name, coded_value, display_label
            FROM enum_mappings
            WHERE is_active = TRUE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(entity_name, field_name, coded_value, display_label)| EnumMappingEntry {
                entity_name,
                field_name,
                coded_value,
                display_label,
            })
            .collect())
    }

    async fn find_value(&self, entity: &str, field: &str, label: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT coded_value
            FROM enum_mappings
            WHERE entity_name = $1 AND field_name = $2 AND display_label = $3 AND is_active = TRUE
            LIMIT 1
            "#,
        )
        .bind(entity)
        .bind(field)
        .bind(label)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(value,)| value))
    }
}
