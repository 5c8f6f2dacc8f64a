//! Table creation and forward-only column-add migrations.

use sqlx::{Pool, Row, Sqlite};

use bn_domain::error::Result;

use crate::store_err;

pub(crate) async fn create_schema(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS traces (
            trace_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            start_time REAL NOT NULL,
            end_time REAL,
            span_count INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'unset',
            tags TEXT NOT NULL DEFAULT '{}',
            total_cost_usd REAL NOT NULL DEFAULT 0,
            total_tokens INTEGER NOT NULL DEFAULT 0,
            sdk_language TEXT,
            created_at REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(store_err)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS spans (
            span_id TEXT PRIMARY KEY,
            trace_id TEXT NOT NULL REFERENCES traces(trace_id) ON DELETE CASCADE,
            parent_span_id TEXT,
            span_type TEXT NOT NULL,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'unset',
            error_message TEXT,
            start_time REAL NOT NULL,
            end_time REAL,
            attributes TEXT NOT NULL DEFAULT '{}',
            annotations TEXT NOT NULL DEFAULT '[]',
            sdk_language TEXT,
            created_at REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(store_err)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS replay_runs (
            replay_id TEXT PRIMARY KEY,
            original_span_id TEXT NOT NULL REFERENCES spans(span_id) ON DELETE CASCADE,
            trace_id TEXT NOT NULL REFERENCES traces(trace_id) ON DELETE CASCADE,
            modified_input TEXT NOT NULL,
            new_output TEXT NOT NULL,
            diff TEXT NOT NULL,
            created_at REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(store_err)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prompt_versions (
            version_id TEXT PRIMARY KEY,
            span_id TEXT NOT NULL REFERENCES spans(span_id) ON DELETE CASCADE,
            prompt_text TEXT NOT NULL,
            label TEXT,
            created_at REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(store_err)?;

    for stmt in [
        "CREATE INDEX IF NOT EXISTS idx_spans_trace_id ON spans(trace_id)",
        "CREATE INDEX IF NOT EXISTS idx_spans_parent_span_id ON spans(parent_span_id)",
        "CREATE INDEX IF NOT EXISTS idx_spans_span_type ON spans(span_type)",
        "CREATE INDEX IF NOT EXISTS idx_spans_start_time ON spans(start_time)",
        "CREATE INDEX IF NOT EXISTS idx_spans_name ON spans(name)",
        "CREATE INDEX IF NOT EXISTS idx_traces_created_at ON traces(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_traces_status ON traces(status)",
    ] {
        sqlx::query(stmt).execute(pool).await.map_err(store_err)?;
    }

    Ok(())
}

/// Add columns that newer versions introduced so databases created by
/// older builds keep working. Only additive changes are supported.
pub(crate) async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    let span_columns = table_columns(pool, "spans").await?;
    if !span_columns.contains(&"annotations".to_string()) {
        tracing::info!("migrating: adding spans.annotations");
        sqlx::query("ALTER TABLE spans ADD COLUMN annotations TEXT NOT NULL DEFAULT '[]'")
            .execute(pool)
            .await
            .map_err(store_err)?;
    }
    if !span_columns.contains(&"sdk_language".to_string()) {
        tracing::info!("migrating: adding spans.sdk_language");
        sqlx::query("ALTER TABLE spans ADD COLUMN sdk_language TEXT")
            .execute(pool)
            .await
            .map_err(store_err)?;
    }

    let trace_columns = table_columns(pool, "traces").await?;
    if !trace_columns.contains(&"sdk_language".to_string()) {
        tracing::info!("migrating: adding traces.sdk_language");
        sqlx::query("ALTER TABLE traces ADD COLUMN sdk_language TEXT")
            .execute(pool)
            .await
            .map_err(store_err)?;
    }

    Ok(())
}

async fn table_columns(pool: &Pool<Sqlite>, table: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(pool)
        .await
        .map_err(store_err)?;
    rows.iter()
        .map(|row| row.try_get::<String, _>("name").map_err(store_err))
        .collect()
}
