//! Span intake: validated upsert plus recomputation of the parent
//! trace's derived columns, all inside one transaction per span.

use sqlx::{Row, Sqlite, Transaction};

use bn_domain::attr;
use bn_domain::error::Result;
use bn_domain::now_epoch;
use bn_domain::span::{SpanRecord, SpanStatus, SpanType};
use bn_domain::trace::IngestedSpan;

use crate::queries::{row_to_span, row_to_trace};
use crate::{store_err, TraceStore};

impl TraceStore {
    /// Write one span. Creates the parent trace row when this is the
    /// trace's first span, inserts or updates the span row keyed by
    /// `span_id`, recomputes the trace's derived columns, and commits.
    ///
    /// Returns the materialized span and trace so callers can broadcast
    /// them after the commit, never before.
    pub async fn ingest_span(&self, rec: &SpanRecord) -> Result<IngestedSpan> {
        rec.validate()?;

        let mut tx = self.pool().begin().await.map_err(store_err)?;
        let now = now_epoch();

        // The span's FK requires the trace row to exist first. The
        // initial derived values come from this span; they are replaced
        // by the recompute below.
        let trace_created = sqlx::query(
            r#"
            INSERT INTO traces
                (trace_id, name, start_time, end_time, span_count, status,
                 tags, total_cost_usd, total_tokens, sdk_language, created_at)
            VALUES (?, ?, ?, ?, 0, 'unset', '{}', 0, 0, ?, ?)
            ON CONFLICT(trace_id) DO NOTHING
            "#,
        )
        .bind(&rec.trace_id)
        .bind(&rec.name)
        .bind(rec.start_time)
        .bind(rec.end_time)
        .bind(&rec.sdk_language)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?
        .rows_affected()
            > 0;

        let span_created = upsert_span(&mut tx, rec, now).await?;

        let root_name = rec.is_root().then(|| rec.name.as_str());
        refresh_trace_aggregates(&mut tx, &rec.trace_id, root_name).await?;

        let span_row = sqlx::query("SELECT * FROM spans WHERE span_id = ?")
            .bind(&rec.span_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(store_err)?;
        let trace_row = sqlx::query("SELECT * FROM traces WHERE trace_id = ?")
            .bind(&rec.trace_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(store_err)?;

        let span = row_to_span(&span_row)?;
        let trace = row_to_trace(&trace_row)?;

        tx.commit().await.map_err(store_err)?;

        Ok(IngestedSpan {
            span,
            trace,
            trace_created,
            span_created,
        })
    }
}

/// Insert a new span row, or update the mutable fields of an existing
/// one (status, error, end time, attributes). Returns true on insert.
async fn upsert_span(
    tx: &mut Transaction<'_, Sqlite>,
    rec: &SpanRecord,
    now: f64,
) -> Result<bool> {
    let existing = sqlx::query("SELECT span_id FROM spans WHERE span_id = ?")
        .bind(&rec.span_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(store_err)?;

    let attributes = serde_json::to_string(&rec.attributes)?;

    if existing.is_none() {
        sqlx::query(
            r#"
            INSERT INTO spans
                (span_id, trace_id, parent_span_id, span_type, name, status,
                 error_message, start_time, end_time, attributes, annotations,
                 sdk_language, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, ?)
            "#,
        )
        .bind(&rec.span_id)
        .bind(&rec.trace_id)
        .bind(&rec.parent_span_id)
        .bind(rec.span_type.as_str())
        .bind(&rec.name)
        .bind(rec.status.as_str())
        .bind(&rec.error_message)
        .bind(rec.start_time)
        .bind(rec.end_time)
        .bind(&attributes)
        .bind(&rec.sdk_language)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(store_err)?;
        Ok(true)
    } else {
        sqlx::query(
            r#"
            UPDATE spans
            SET status = ?, error_message = ?, end_time = ?, attributes = ?
            WHERE span_id = ?
            "#,
        )
        .bind(rec.status.as_str())
        .bind(&rec.error_message)
        .bind(rec.end_time)
        .bind(&attributes)
        .bind(&rec.span_id)
        .execute(&mut **tx)
        .await
        .map_err(store_err)?;
        Ok(false)
    }
}

/// Recompute every derived trace column from the committed span set.
///
/// Recomputing (rather than incrementing) makes upserts count once by
/// construction: the totals always reflect the current attributes of the
/// distinct spans in the trace, and a span flipping `unset` → `error`
/// flips the trace even though `span_count` did not change.
async fn refresh_trace_aggregates(
    tx: &mut Transaction<'_, Sqlite>,
    trace_id: &str,
    root_name: Option<&str>,
) -> Result<()> {
    let rows = sqlx::query(
        "SELECT span_type, status, start_time, end_time, attributes
         FROM spans WHERE trace_id = ?",
    )
    .bind(trace_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(store_err)?;

    let mut span_count: i64 = 0;
    let mut min_start = f64::INFINITY;
    let mut max_end: Option<f64> = None;
    let mut total_cost = 0.0f64;
    let mut total_tokens: i64 = 0;
    let mut has_error = false;
    let mut has_unset = false;

    for row in &rows {
        span_count += 1;

        let start: f64 = row.try_get("start_time").map_err(store_err)?;
        min_start = min_start.min(start);

        if let Some(end) = row
            .try_get::<Option<f64>, _>("end_time")
            .map_err(store_err)?
        {
            max_end = Some(max_end.map_or(end, |m: f64| m.max(end)));
        }

        let status: String = row.try_get("status").map_err(store_err)?;
        match SpanStatus::parse(&status).unwrap_or(SpanStatus::Unset) {
            SpanStatus::Error => has_error = true,
            SpanStatus::Unset => has_unset = true,
            SpanStatus::Ok => {}
        }

        let span_type: String = row.try_get("span_type").map_err(store_err)?;
        if SpanType::parse(&span_type) == Some(SpanType::LlmCall) {
            let raw: String = row.try_get("attributes").map_err(store_err)?;
            let attrs: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(&raw).unwrap_or_default();
            total_cost += attr::as_f64(attrs.get(attr::LLM_COST_USD));
            total_tokens += attr::as_i64(attrs.get(attr::LLM_TOKENS_TOTAL));
        }
    }

    let status = if has_error {
        SpanStatus::Error
    } else if has_unset || span_count == 0 {
        SpanStatus::Unset
    } else {
        SpanStatus::Ok
    };

    sqlx::query(
        r#"
        UPDATE traces
        SET span_count = ?, start_time = ?, end_time = ?, status = ?,
            total_cost_usd = ?, total_tokens = ?
        WHERE trace_id = ?
        "#,
    )
    .bind(span_count)
    .bind(if min_start.is_finite() { min_start } else { 0.0 })
    .bind(max_end)
    .bind(status.as_str())
    .bind(total_cost)
    .bind(total_tokens)
    .bind(trace_id)
    .execute(&mut **tx)
    .await
    .map_err(store_err)?;

    // A newly arrived root span renames the trace.
    if let Some(name) = root_name {
        sqlx::query("UPDATE traces SET name = ? WHERE trace_id = ?")
            .bind(name)
            .bind(trace_id)
            .execute(&mut **tx)
            .await
            .map_err(store_err)?;
    }

    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
