//! Database connection management using sqlx

use crate::config::SearchConfig;
use crate::error::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// Initialize the database connection pool
pub async fn init_pool(config: &SearchConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_acquire_timeout)
        .connect(config.require_database_url()?)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1").execute(&pool).await?;

    info!(
        max_connections = config.db_max_connections,
        "Database pool ready"
    );
    Ok(pool)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS enum_mappings (
        id BIGSERIAL PRIMARY KEY,
        entity_name TEXT NOT NULL,
        field_name TEXT NOT NULL,
        coded_value BIGINT NOT NULL,
        display_label TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        UNIQUE (entity_name, field_name, coded_value)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS search_history (
        id UUID PRIMARY KEY,
        query_text TEXT NOT NULL,
        executed_sql TEXT NOT NULL,
        result_count BIGINT NOT NULL,
        duration_ms BIGINT NOT NULL,
        success BOOLEAN NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_search_history_query ON search_history (lower(query_text))",
];

/// Create the lookup and history tables if they do not exist yet.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
