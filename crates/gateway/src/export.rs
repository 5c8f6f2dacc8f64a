//! Trace exporters (native JSON, bulk JSON, OTLP JSON, CSV) and the
//! native importer.

use serde_json::Value;

use bn_domain::attr;
use bn_domain::error::{Error, Result};
use bn_domain::export::{
    BulkTraceExport, ImportOutcome, TraceExport, EXPORT_FORMAT, EXPORT_VERSION,
};
use bn_domain::now_epoch;
use bn_domain::span::SpanDetail;
use bn_store::TraceStore;

use crate::otlp;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Exporters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Native JSON export of one trace, or `None` when the id is unknown.
pub async fn export_trace_json(
    store: &TraceStore,
    trace_id: &str,
) -> Result<Option<TraceExport>> {
    let Some(detail) = store.get_trace_detail(trace_id).await? else {
        return Ok(None);
    };
    Ok(Some(TraceExport {
        version: EXPORT_VERSION.into(),
        format: EXPORT_FORMAT.into(),
        exported_at: now_epoch(),
        trace: detail.summary,
        spans: detail.spans,
    }))
}

/// Bulk JSON export. Unknown ids are skipped, not errors.
pub async fn export_bulk(store: &TraceStore, trace_ids: &[String]) -> Result<BulkTraceExport> {
    let mut traces = Vec::new();
    for trace_id in trace_ids {
        if let Some(export) = export_trace_json(store, trace_id).await? {
            traces.push(export);
        }
    }
    Ok(BulkTraceExport {
        version: EXPORT_VERSION.into(),
        format: EXPORT_FORMAT.into(),
        exported_at: now_epoch(),
        traces,
    })
}

/// OTLP JSON export of one trace.
pub async fn export_trace_otlp(store: &TraceStore, trace_id: &str) -> Result<Option<Value>> {
    let Some(detail) = store.get_trace_detail(trace_id).await? else {
        return Ok(None);
    };
    Ok(Some(otlp::trace_to_otlp(&detail.summary, &detail.spans)))
}

/// CSV export of one trace, one row per span.
pub async fn export_trace_csv(store: &TraceStore, trace_id: &str) -> Result<Option<String>> {
    let Some(detail) = store.get_trace_detail(trace_id).await? else {
        return Ok(None);
    };
    Ok(Some(spans_to_csv(&detail.spans)?))
}

pub fn spans_to_csv(spans: &[SpanDetail]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "trace_id",
            "span_id",
            "parent_span_id",
            "name",
            "span_type",
            "start_time",
            "end_time",
            "duration_ms",
            "status",
            "cost",
            "tokens",
        ])
        .map_err(csv_err)?;

    for span in spans {
        let record: Vec<String> = vec![
            span.trace_id.clone(),
            span.span_id.clone(),
            span.parent_span_id.clone().unwrap_or_default(),
            span.name.clone(),
            span.span_type.as_str().to_string(),
            span.start_time.to_string(),
            opt_num(span.end_time),
            opt_num(span.duration_ms),
            span.status.as_str().to_string(),
            attr_cell(span.attributes.get(attr::LLM_COST_USD)),
            attr_cell(span.attributes.get(attr::LLM_TOKENS_TOTAL)),
        ];
        writer.write_record(&record).map_err(csv_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Store(format!("csv flush: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::Store(format!("csv encoding: {e}")))
}

fn csv_err(e: csv::Error) -> Error {
    Error::Store(format!("csv: {e}"))
}

fn opt_num(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// An attribute rendered into a CSV cell: numbers and strings verbatim,
/// anything else as JSON text, missing as empty.
fn attr_cell(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Importer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Validate the envelope and insert the trace with recomputed
/// aggregates. Duplicate ids surface as `Conflict`.
pub async fn import_trace(store: &TraceStore, export: &TraceExport) -> Result<ImportOutcome> {
    if export.format != EXPORT_FORMAT {
        return Err(Error::BadRequest(format!(
            "Unsupported export format: {:?} (expected {:?})",
            export.format, EXPORT_FORMAT
        )));
    }
    if export.version != EXPORT_VERSION {
        return Err(Error::BadRequest(format!(
            "Unsupported export version: {:?} (expected {:?})",
            export.version, EXPORT_VERSION
        )));
    }
    store.import_trace(export).await
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use bn_domain::span::{SpanRecord, SpanStatus, SpanType};
    use serde_json::json;

    async fn temp_store() -> (TraceStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = TraceStore::open(&dir.path().join("traces.db"))
            .await
            .unwrap();
        (store, dir)
    }

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
            end_time: Some(start + 0.5),
            attributes: serde_json::Map::new(),
            sdk_language: None,
        }
    }

    #[tokio::test]
    async fn csv_shape_and_in_flight_cells() {
        let (store, _dir) = temp_store().await;

        let mut llm = span("l1", "t1", 100.0);
        llm.span_type = SpanType::LlmCall;
        llm.attributes.insert("llm.cost_usd".into(), json!(0.05));
        llm.attributes
            .insert("llm.tokens.total".into(), json!(1000));
        store.ingest_span(&llm).await.unwrap();

        let mut open_span = span("s2", "t1", 101.0);
        open_span.status = SpanStatus::Unset;
        open_span.end_time = None;
        store.ingest_span(&open_span).await.unwrap();

        let csv_text = export_trace_csv(&store, "t1").await.unwrap().unwrap();
        let lines: Vec<&str> = csv_text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("trace_id,span_id,parent_span_id"));
        assert!(lines[1].contains("0.05"));
        assert!(lines[1].contains("1000"));
        // In-flight span: empty end_time/duration/cost/tokens cells.
        assert!(lines[2].ends_with("unset,,"));

        assert!(export_trace_csv(&store, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn native_roundtrip_with_rewritten_ids() {
        let (store, _dir) = temp_store().await;

        let mut llm = span("l1", "orig", 100.0);
        llm.span_type = SpanType::LlmCall;
        llm.attributes.insert("llm.cost_usd".into(), json!(0.08));
        llm.attributes
            .insert("llm.tokens.total".into(), json!(1200));
        store.ingest_span(&llm).await.unwrap();
        let mut child = span("s2", "orig", 100.5);
        child.parent_span_id = Some("l1".into());
        store.ingest_span(&child).await.unwrap();

        let mut export = export_trace_json(&store, "orig").await.unwrap().unwrap();
        let original_trace = export.trace.clone();
        let original_spans = export.spans.clone();

        export.trace.trace_id = "copy".into();
        for span in &mut export.spans {
            span.trace_id = "copy".into();
        }

        let outcome = import_trace(&store, &export).await.unwrap();
        assert_eq!(outcome.span_count, 2);

        let reexport = export_trace_json(&store, "copy").await.unwrap().unwrap();
        assert_eq!(reexport.trace.span_count, original_trace.span_count);
        assert_eq!(reexport.trace.status, original_trace.status);
        assert!(
            (reexport.trace.total_cost_usd - original_trace.total_cost_usd).abs() < 1e-9
        );
        assert_eq!(reexport.trace.total_tokens, original_trace.total_tokens);
        for (a, b) in reexport.spans.iter().zip(original_spans.iter()) {
            assert_eq!(a.span_id, b.span_id);
            assert_eq!(a.name, b.name);
            assert_eq!(a.span_type, b.span_type);
            assert_eq!(a.status, b.status);
            assert_eq!(a.attributes, b.attributes);
            assert_eq!(a.start_time, b.start_time);
            assert_eq!(a.end_time, b.end_time);
        }
    }

    #[tokio::test]
    async fn import_envelope_discipline() {
        let (store, _dir) = temp_store().await;

        let mut export = TraceExport {
            version: EXPORT_VERSION.into(),
            format: "zipkin".into(),
            exported_at: 1.0,
            trace: bn_domain::trace::TraceSummary {
                trace_id: "x".into(),
                name: "n".into(),
                start_time: 1.0,
                end_time: None,
                duration_ms: None,
                span_count: 0,
                status: SpanStatus::Unset,
                total_cost_usd: 0.0,
                total_tokens: 0,
                tags: Default::default(),
                sdk_language: None,
            },
            spans: vec![],
        };

        let err = import_trace(&store, &export).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        export.format = EXPORT_FORMAT.into();
        export.version = "2".into();
        let err = import_trace(&store, &export).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn bulk_export_skips_unknown_ids() {
        let (store, _dir) = temp_store().await;
        store.ingest_span(&span("s1", "t1", 100.0)).await.unwrap();
        store.ingest_span(&span("s2", "t2", 100.0)).await.unwrap();

        let bulk = export_bulk(&store, &["t1".into(), "ghost".into(), "t2".into()])
            .await
            .unwrap();
        assert_eq!(bulk.traces.len(), 2);
        assert_eq!(bulk.format, EXPORT_FORMAT);
    }
}
