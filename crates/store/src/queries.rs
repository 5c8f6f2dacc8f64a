//! Read paths and non-ingest mutations: trace listing/detail, tags,
//! annotations, prompt versions, replay runs, deletes, stats, import.

use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use bn_domain::attr;
use bn_domain::error::{Error, Result};
use bn_domain::export::{ImportOutcome, ReplayRun, TraceExport};
use bn_domain::now_epoch;
use bn_domain::span::{Annotation, PromptVersion, SpanDetail, SpanStatus, SpanType};
use bn_domain::trace::{StoreStats, TraceDetail, TraceSummary};

use crate::{store_err, TraceStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Row mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn row_to_span(row: &SqliteRow) -> Result<SpanDetail> {
    let start_time: f64 = row.try_get("start_time").map_err(store_err)?;
    let end_time: Option<f64> = row.try_get("end_time").map_err(store_err)?;

    let span_type: String = row.try_get("span_type").map_err(store_err)?;
    let status: String = row.try_get("status").map_err(store_err)?;

    let attributes: String = row.try_get("attributes").map_err(store_err)?;
    let annotations: String = row.try_get("annotations").map_err(store_err)?;

    Ok(SpanDetail {
        span_id: row.try_get("span_id").map_err(store_err)?,
        trace_id: row.try_get("trace_id").map_err(store_err)?,
        parent_span_id: row.try_get("parent_span_id").map_err(store_err)?,
        span_type: SpanType::parse(&span_type).unwrap_or(SpanType::Custom),
        name: row.try_get("name").map_err(store_err)?,
        status: SpanStatus::parse(&status).unwrap_or(SpanStatus::Unset),
        error_message: row.try_get("error_message").map_err(store_err)?,
        start_time,
        end_time,
        duration_ms: end_time.map(|end| (end - start_time) * 1000.0),
        attributes: serde_json::from_str(&attributes).unwrap_or_default(),
        annotations: serde_json::from_str(&annotations).unwrap_or_default(),
        sdk_language: row.try_get("sdk_language").map_err(store_err)?,
    })
}

pub(crate) fn row_to_trace(row: &SqliteRow) -> Result<TraceSummary> {
    let start_time: f64 = row.try_get("start_time").map_err(store_err)?;
    let end_time: Option<f64> = row.try_get("end_time").map_err(store_err)?;
    let status: String = row.try_get("status").map_err(store_err)?;
    let tags: String = row.try_get("tags").map_err(store_err)?;

    Ok(TraceSummary {
        trace_id: row.try_get("trace_id").map_err(store_err)?,
        name: row.try_get("name").map_err(store_err)?,
        start_time,
        end_time,
        duration_ms: end_time.map(|end| (end - start_time) * 1000.0),
        span_count: row.try_get("span_count").map_err(store_err)?,
        status: SpanStatus::parse(&status).unwrap_or(SpanStatus::Unset),
        total_cost_usd: row.try_get("total_cost_usd").map_err(store_err)?,
        total_tokens: row.try_get("total_tokens").map_err(store_err)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        sdk_language: row.try_get("sdk_language").map_err(store_err)?,
    })
}

fn row_to_prompt_version(row: &SqliteRow) -> Result<PromptVersion> {
    Ok(PromptVersion {
        version_id: row.try_get("version_id").map_err(store_err)?,
        span_id: row.try_get("span_id").map_err(store_err)?,
        prompt_text: row.try_get("prompt_text").map_err(store_err)?,
        label: row.try_get("label").map_err(store_err)?,
        created_at: row.try_get("created_at").map_err(store_err)?,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Spans
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl TraceStore {
    pub async fn get_span(&self, span_id: &str) -> Result<Option<SpanDetail>> {
        let row = sqlx::query("SELECT * FROM spans WHERE span_id = ?")
            .bind(span_id)
            .fetch_optional(self.pool())
            .await
            .map_err(store_err)?;
        row.as_ref().map(row_to_span).transpose()
    }

    pub async fn spans_for_trace(&self, trace_id: &str) -> Result<Vec<SpanDetail>> {
        let rows =
            sqlx::query("SELECT * FROM spans WHERE trace_id = ? ORDER BY start_time")
                .bind(trace_id)
                .fetch_all(self.pool())
                .await
                .map_err(store_err)?;
        rows.iter().map(row_to_span).collect()
    }

    /// Replace (not merge) a span's annotations. Returns the updated span.
    pub async fn update_span_annotations(
        &self,
        span_id: &str,
        annotations: &[Annotation],
    ) -> Result<SpanDetail> {
        let raw = serde_json::to_string(annotations)?;
        let updated = sqlx::query("UPDATE spans SET annotations = ? WHERE span_id = ?")
            .bind(&raw)
            .bind(span_id)
            .execute(self.pool())
            .await
            .map_err(store_err)?
            .rows_affected();
        if updated == 0 {
            return Err(Error::NotFound(format!("span {span_id} not found")));
        }
        self.get_span(span_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("span {span_id} not found")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Traces
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl TraceStore {
    /// Paginated trace list, newest first, with an optional status
    /// filter. Returns the page plus the total match count.
    pub async fn list_traces(
        &self,
        limit: i64,
        offset: i64,
        status: Option<SpanStatus>,
    ) -> Result<(Vec<TraceSummary>, i64)> {
        let (total, rows) = match status {
            Some(status) => {
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM traces WHERE status = ?")
                        .bind(status.as_str())
                        .fetch_one(self.pool())
                        .await
                        .map_err(store_err)?;
                let rows = sqlx::query(
                    "SELECT * FROM traces WHERE status = ?
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(status.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool())
                .await
                .map_err(store_err)?;
                (total, rows)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM traces")
                    .fetch_one(self.pool())
                    .await
                    .map_err(store_err)?;
                let rows = sqlx::query(
                    "SELECT * FROM traces ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool())
                .await
                .map_err(store_err)?;
                (total, rows)
            }
        };

        let traces = rows
            .iter()
            .map(row_to_trace)
            .collect::<Result<Vec<_>>>()?;
        Ok((traces, total))
    }

    pub async fn get_trace(&self, trace_id: &str) -> Result<Option<TraceSummary>> {
        let row = sqlx::query("SELECT * FROM traces WHERE trace_id = ?")
            .bind(trace_id)
            .fetch_optional(self.pool())
            .await
            .map_err(store_err)?;
        row.as_ref().map(row_to_trace).transpose()
    }

    pub async fn get_trace_detail(&self, trace_id: &str) -> Result<Option<TraceDetail>> {
        let Some(summary) = self.get_trace(trace_id).await? else {
            return Ok(None);
        };
        let spans = self.spans_for_trace(trace_id).await?;
        Ok(Some(TraceDetail { summary, spans }))
    }

    /// Replace (not merge) a trace's tags. Returns the updated summary.
    pub async fn update_trace_tags(
        &self,
        trace_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<TraceSummary> {
        let raw = serde_json::to_string(tags)?;
        let updated = sqlx::query("UPDATE traces SET tags = ? WHERE trace_id = ?")
            .bind(&raw)
            .bind(trace_id)
            .execute(self.pool())
            .await
            .map_err(store_err)?
            .rows_affected();
        if updated == 0 {
            return Err(Error::NotFound(format!("trace {trace_id} not found")));
        }
        self.get_trace(trace_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("trace {trace_id} not found")))
    }

    /// Cascade-delete one trace. Returns false when the id is unknown.
    pub async fn delete_trace(&self, trace_id: &str) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM traces WHERE trace_id = ?")
            .bind(trace_id)
            .execute(self.pool())
            .await
            .map_err(store_err)?
            .rows_affected();
        Ok(deleted > 0)
    }

    /// Batch delete by explicit ids, or by age when `older_than`
    /// (epoch seconds, compared against `created_at`) is given.
    pub async fn delete_traces_batch(
        &self,
        trace_ids: Option<&[String]>,
        older_than: Option<f64>,
    ) -> Result<u64> {
        let mut tx = self.pool().begin().await.map_err(store_err)?;
        let mut deleted = 0u64;

        if let Some(ids) = trace_ids {
            for id in ids {
                deleted += sqlx::query("DELETE FROM traces WHERE trace_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(store_err)?
                    .rows_affected();
            }
        } else if let Some(cutoff) = older_than {
            deleted = sqlx::query("DELETE FROM traces WHERE created_at < ?")
                .bind(cutoff)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?
                .rows_affected();
        }

        tx.commit().await.map_err(store_err)?;
        Ok(deleted)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let total_traces: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM traces")
            .fetch_one(self.pool())
            .await
            .map_err(store_err)?;
        let total_spans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM spans")
            .fetch_one(self.pool())
            .await
            .map_err(store_err)?;
        let oldest: Option<f64> = sqlx::query_scalar("SELECT MIN(created_at) FROM traces")
            .fetch_one(self.pool())
            .await
            .map_err(store_err)?;
        let database_size_bytes = std::fs::metadata(self.db_path())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            database_size_bytes,
            total_traces,
            total_spans,
            oldest_trace_timestamp: oldest,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompt versions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl TraceStore {
    pub async fn list_prompt_versions(&self, span_id: &str) -> Result<Vec<PromptVersion>> {
        if self.get_span(span_id).await?.is_none() {
            return Err(Error::NotFound(format!("span {span_id} not found")));
        }
        let rows = sqlx::query(
            "SELECT * FROM prompt_versions WHERE span_id = ? ORDER BY created_at DESC",
        )
        .bind(span_id)
        .fetch_all(self.pool())
        .await
        .map_err(store_err)?;
        rows.iter().map(row_to_prompt_version).collect()
    }

    /// Create a prompt version. Only `llm_call` spans carry prompts.
    pub async fn create_prompt_version(
        &self,
        span_id: &str,
        prompt_text: &str,
        label: Option<&str>,
    ) -> Result<PromptVersion> {
        let span = self
            .get_span(span_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("span {span_id} not found")))?;
        if span.span_type != SpanType::LlmCall {
            return Err(Error::BadRequest(
                "prompt versions only supported for llm_call spans".into(),
            ));
        }

        let version = PromptVersion {
            version_id: Uuid::new_v4().to_string(),
            span_id: span_id.to_string(),
            prompt_text: prompt_text.to_string(),
            label: label.map(str::to_string),
            created_at: now_epoch(),
        };
        sqlx::query(
            "INSERT INTO prompt_versions (version_id, span_id, prompt_text, label, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&version.version_id)
        .bind(&version.span_id)
        .bind(&version.prompt_text)
        .bind(&version.label)
        .bind(version.created_at)
        .execute(self.pool())
        .await
        .map_err(store_err)?;
        Ok(version)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Replay runs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl TraceStore {
    pub async fn insert_replay_run(&self, run: &ReplayRun) -> Result<()> {
        sqlx::query(
            "INSERT INTO replay_runs
                 (replay_id, original_span_id, trace_id, modified_input,
                  new_output, diff, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&run.replay_id)
        .bind(&run.original_span_id)
        .bind(&run.trace_id)
        .bind(serde_json::to_string(&run.modified_input)?)
        .bind(serde_json::to_string(&run.new_output)?)
        .bind(serde_json::to_string(&run.diff)?)
        .bind(run.created_at)
        .execute(self.pool())
        .await
        .map_err(store_err)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn count_replay_runs(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM replay_runs")
            .fetch_one(self.pool())
            .await
            .map_err(store_err)
    }

    #[cfg(test)]
    pub(crate) async fn count_prompt_versions(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM prompt_versions")
            .fetch_one(self.pool())
            .await
            .map_err(store_err)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Import
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl TraceStore {
    /// Import a previously exported trace. The trace's derived columns
    /// are recomputed from the supplied spans, never taken from the
    /// envelope. Everything happens in a single transaction.
    pub async fn import_trace(&self, export: &TraceExport) -> Result<ImportOutcome> {
        let trace_id = &export.trace.trace_id;

        let mut tx = self.pool().begin().await.map_err(store_err)?;

        let existing = sqlx::query("SELECT trace_id FROM traces WHERE trace_id = ?")
            .bind(trace_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_err)?;
        if existing.is_some() {
            return Err(Error::Conflict(format!("Trace {trace_id} already exists")));
        }

        // Recompute aggregates from the spans in the envelope.
        let mut total_cost = 0.0f64;
        let mut total_tokens: i64 = 0;
        let mut has_error = false;
        let mut all_ok = true;
        let mut min_start = f64::INFINITY;
        let mut max_end: Option<f64> = None;

        for span in &export.spans {
            if span.span_type == SpanType::LlmCall {
                total_cost += attr::as_f64(span.attributes.get(attr::LLM_COST_USD));
                total_tokens += attr::as_i64(span.attributes.get(attr::LLM_TOKENS_TOTAL));
            }
            match span.status {
                SpanStatus::Error => has_error = true,
                SpanStatus::Unset => all_ok = false,
                SpanStatus::Ok => {}
            }
            min_start = min_start.min(span.start_time);
            if let Some(end) = span.end_time {
                max_end = Some(max_end.map_or(end, |m: f64| m.max(end)));
            }
        }

        let status = if has_error {
            SpanStatus::Error
        } else if all_ok && !export.spans.is_empty() {
            SpanStatus::Ok
        } else {
            SpanStatus::Unset
        };
        let start_time = if min_start.is_finite() {
            min_start
        } else {
            export.trace.start_time
        };
        let end_time = max_end.or(export.trace.end_time);

        let now = now_epoch();
        sqlx::query(
            r#"
            INSERT INTO traces
                (trace_id, name, start_time, end_time, span_count, status,
                 tags, total_cost_usd, total_tokens, sdk_language, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trace_id)
        .bind(&export.trace.name)
        .bind(start_time)
        .bind(end_time)
        .bind(export.spans.len() as i64)
        .bind(status.as_str())
        .bind(serde_json::to_string(&export.trace.tags)?)
        .bind(total_cost)
        .bind(total_tokens)
        .bind(&export.trace.sdk_language)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        for span in &export.spans {
            sqlx::query(
                r#"
                INSERT INTO spans
                    (span_id, trace_id, parent_span_id, span_type, name, status,
                     error_message, start_time, end_time, attributes, annotations,
                     sdk_language, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&span.span_id)
            .bind(trace_id)
            .bind(&span.parent_span_id)
            .bind(span.span_type.as_str())
            .bind(&span.name)
            .bind(span.status.as_str())
            .bind(&span.error_message)
            .bind(span.start_time)
            .bind(span.end_time)
            .bind(serde_json::to_string(&span.attributes)?)
            .bind(serde_json::to_string(&span.annotations)?)
            .bind(&span.sdk_language)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;

        tracing::info!(
            trace_id = %trace_id,
            spans = export.spans.len(),
            "imported trace"
        );

        Ok(ImportOutcome {
            trace_id: trace_id.clone(),
            span_count: export.spans.len(),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::open_temp;
    use bn_domain::export::{ReplayDiff, EXPORT_FORMAT, EXPORT_VERSION};
    use bn_domain::span::SpanRecord;
    use serde_json::json;

    fn span(span_id: &str, trace_id: &str, start: f64) -> SpanRecord {
        SpanRecord {
            span_id: span_id.into(),
            trace_id: trace_id.into(),
            parent_span_id: None,
            span_type: SpanType::ToolUse,
            name: format!("op-{span_id}"),
            status: SpanStatus::Ok,
            error_message: None,
            start_time: start,
            end_time: Some(start + 1.0),
            attributes: serde_json::Map::new(),
            sdk_language: None,
        }
    }

    async fn seed_trace(store: &TraceStore, trace_id: &str, n: usize) {
        for i in 0..n {
            store
                .ingest_span(&span(&format!("{trace_id}-s{i}"), trace_id, 100.0 + i as f64))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn list_traces_newest_first_with_paging() {
        let (store, _dir) = open_temp().await;
        seed_trace(&store, "t1", 1).await;
        seed_trace(&store, "t2", 1).await;
        seed_trace(&store, "t3", 1).await;

        let (page, total) = store.list_traces(2, 0, None).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].trace_id, "t3");

        let (page2, _) = store.list_traces(2, 2, None).await.unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].trace_id, "t1");
    }

    #[tokio::test]
    async fn list_traces_filters_by_status() {
        let (store, _dir) = open_temp().await;
        seed_trace(&store, "ok-trace", 2).await;

        let mut bad = span("err-s", "err-trace", 100.0);
        bad.status = SpanStatus::Error;
        store.ingest_span(&bad).await.unwrap();

        let (errs, total) = store
            .list_traces(10, 0, Some(SpanStatus::Error))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(errs[0].trace_id, "err-trace");
    }

    #[tokio::test]
    async fn trace_detail_orders_spans_by_start_time() {
        let (store, _dir) = open_temp().await;
        store.ingest_span(&span("late", "t1", 200.0)).await.unwrap();
        store.ingest_span(&span("early", "t1", 100.0)).await.unwrap();

        let detail = store.get_trace_detail("t1").await.unwrap().unwrap();
        assert_eq!(detail.spans.len(), 2);
        assert_eq!(detail.spans[0].span_id, "early");
        assert_eq!(detail.spans[1].span_id, "late");
    }

    #[tokio::test]
    async fn tags_replace_not_merge() {
        let (store, _dir) = open_temp().await;
        seed_trace(&store, "t1", 1).await;

        let mut tags = BTreeMap::new();
        tags.insert("env".to_string(), "prod".to_string());
        let trace = store.update_trace_tags("t1", &tags).await.unwrap();
        assert_eq!(trace.tags.get("env").map(String::as_str), Some("prod"));

        let mut tags2 = BTreeMap::new();
        tags2.insert("team".to_string(), "infra".to_string());
        let trace = store.update_trace_tags("t1", &tags2).await.unwrap();
        assert!(trace.tags.get("env").is_none());
        assert_eq!(trace.tags.get("team").map(String::as_str), Some("infra"));

        assert!(matches!(
            store.update_trace_tags("missing", &tags2).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn annotations_replace_and_survive_readback() {
        let (store, _dir) = open_temp().await;
        seed_trace(&store, "t1", 1).await;

        let notes = vec![Annotation {
            id: "a1".into(),
            text: "looks slow".into(),
            created_at: 5.0,
        }];
        let span = store
            .update_span_annotations("t1-s0", &notes)
            .await
            .unwrap();
        assert_eq!(span.annotations.len(), 1);
        assert_eq!(span.annotations[0].text, "looks slow");

        let span = store.get_span("t1-s0").await.unwrap().unwrap();
        assert_eq!(span.annotations.len(), 1);

        let span = store.update_span_annotations("t1-s0", &[]).await.unwrap();
        assert!(span.annotations.is_empty());
    }

    #[tokio::test]
    async fn prompt_versions_require_llm_call_span() {
        let (store, _dir) = open_temp().await;
        seed_trace(&store, "t1", 1).await;
        let err = store
            .create_prompt_version("t1-s0", "prompt", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let mut llm = span("llm1", "t1", 110.0);
        llm.span_type = SpanType::LlmCall;
        store.ingest_span(&llm).await.unwrap();

        let v1 = store
            .create_prompt_version("llm1", "first", Some("baseline"))
            .await
            .unwrap();
        store
            .create_prompt_version("llm1", "second", None)
            .await
            .unwrap();

        let versions = store.list_prompt_versions("llm1").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert!(versions.iter().any(|v| v.version_id == v1.version_id));
    }

    #[tokio::test]
    async fn delete_trace_cascades_to_descendants() {
        let (store, _dir) = open_temp().await;
        let mut llm = span("llm1", "t1", 100.0);
        llm.span_type = SpanType::LlmCall;
        store.ingest_span(&llm).await.unwrap();

        store
            .create_prompt_version("llm1", "prompt", None)
            .await
            .unwrap();
        store
            .insert_replay_run(&ReplayRun {
                replay_id: "r1".into(),
                original_span_id: "llm1".into(),
                trace_id: "t1".into(),
                modified_input: serde_json::Map::new(),
                new_output: serde_json::Map::new(),
                diff: ReplayDiff {
                    old_completion: "a".into(),
                    new_completion: "b".into(),
                    changed: true,
                },
                created_at: 1.0,
            })
            .await
            .unwrap();

        assert!(store.delete_trace("t1").await.unwrap());
        assert!(store.get_span("llm1").await.unwrap().is_none());
        assert_eq!(store.count_replay_runs().await.unwrap(), 0);
        assert_eq!(store.count_prompt_versions().await.unwrap(), 0);

        assert!(!store.delete_trace("t1").await.unwrap());
    }

    #[tokio::test]
    async fn batch_delete_by_ids_and_age() {
        let (store, _dir) = open_temp().await;
        seed_trace(&store, "t1", 1).await;
        seed_trace(&store, "t2", 1).await;
        seed_trace(&store, "t3", 1).await;

        let deleted = store
            .delete_traces_batch(Some(&["t1".into(), "nope".into()]), None)
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        // Everything left was created before "far future".
        let deleted = store
            .delete_traces_batch(None, Some(now_epoch() + 1000.0))
            .await
            .unwrap();
        assert_eq!(deleted, 2);

        let (traces, _) = store.list_traces(10, 0, None).await.unwrap();
        assert!(traces.is_empty());
    }

    #[tokio::test]
    async fn stats_counts_and_oldest() {
        let (store, _dir) = open_temp().await;
        seed_trace(&store, "t1", 2).await;
        seed_trace(&store, "t2", 1).await;

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_traces, 2);
        assert_eq!(stats.total_spans, 3);
        assert!(stats.oldest_trace_timestamp.is_some());
        assert!(stats.database_size_bytes > 0);
    }

    #[tokio::test]
    async fn import_rejects_duplicate_and_recomputes_aggregates() {
        let (store, _dir) = open_temp().await;

        let mut llm = span("llm1", "orig", 100.0);
        llm.span_type = SpanType::LlmCall;
        llm.attributes.insert("llm.cost_usd".into(), json!(0.05));
        llm.attributes
            .insert("llm.tokens.total".into(), json!(1000));
        store.ingest_span(&llm).await.unwrap();
        store.ingest_span(&span("s2", "orig", 105.0)).await.unwrap();

        let trace = store.get_trace("orig").await.unwrap().unwrap();
        let spans = store.spans_for_trace("orig").await.unwrap();

        // Rewrite ids to dodge the duplicate guard.
        let mut imported_trace = trace.clone();
        imported_trace.trace_id = "copy".into();
        // Deliberately lie in the envelope's declared aggregates.
        imported_trace.total_cost_usd = 999.0;
        imported_trace.span_count = 42;
        let imported_spans: Vec<_> = spans
            .iter()
            .map(|s| {
                let mut s = s.clone();
                s.trace_id = "copy".into();
                s
            })
            .collect();

        let export = TraceExport {
            version: EXPORT_VERSION.into(),
            format: EXPORT_FORMAT.into(),
            exported_at: now_epoch(),
            trace: imported_trace,
            spans: imported_spans,
        };

        let outcome = store.import_trace(&export).await.unwrap();
        assert_eq!(outcome.span_count, 2);

        let copy = store.get_trace("copy").await.unwrap().unwrap();
        assert_eq!(copy.span_count, trace.span_count);
        assert_eq!(copy.status, trace.status);
        assert!((copy.total_cost_usd - trace.total_cost_usd).abs() < 1e-9);
        assert_eq!(copy.total_tokens, trace.total_tokens);
        assert_eq!(copy.start_time, trace.start_time);
        assert_eq!(copy.end_time, trace.end_time);

        let copy_spans = store.spans_for_trace("copy").await.unwrap();
        assert_eq!(copy_spans.len(), 2);

        // Same envelope again: duplicate.
        let err = store.import_trace(&export).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(err.to_string().contains("already exists"));
    }
}
