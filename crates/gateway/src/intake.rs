//! Span intake pipeline: validate, persist (one transaction per span),
//! then fan out to live subscribers in commit order.

use std::sync::Arc;

use serde_json::Value;

use bn_domain::error::Result;
use bn_domain::span::SpanRecord;
use bn_domain::trace::{IngestSummary, IngestedSpan};
use bn_store::TraceStore;

use crate::live::{LiveBus, LiveEvent};

pub struct Intake {
    store: Arc<TraceStore>,
    bus: Arc<LiveBus>,
}

impl Intake {
    pub fn new(store: Arc<TraceStore>, bus: Arc<LiveBus>) -> Self {
        Self { store, bus }
    }

    /// Ingest a batch. Each span commits in its own transaction, so one
    /// malformed span never rolls back its neighbors. Returns counters
    /// only; rejects are logged, not reported per span.
    pub async fn ingest_batch(&self, records: &[SpanRecord]) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for rec in records {
            match self.ingest_one(rec).await {
                Ok(_) => summary.accepted += 1,
                Err(e) => {
                    tracing::warn!(span_id = %rec.span_id, error = %e, "span rejected");
                    summary.rejected += 1;
                }
            }
        }
        summary
    }

    /// Ingest a batch of raw JSON values, counting spans that fail
    /// schema deserialization as rejected.
    pub async fn ingest_values(&self, values: &[Value]) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for value in values {
            match serde_json::from_value::<SpanRecord>(value.clone()) {
                Ok(rec) => match self.ingest_one(&rec).await {
                    Ok(_) => summary.accepted += 1,
                    Err(e) => {
                        tracing::warn!(span_id = %rec.span_id, error = %e, "span rejected");
                        summary.rejected += 1;
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "span failed schema validation");
                    summary.rejected += 1;
                }
            }
        }
        summary
    }

    /// Ingest one span and broadcast the resulting events after the
    /// commit: `trace_created` for a brand-new trace (unfiltered
    /// sessions only), then `span_created` or `span_updated`.
    pub async fn ingest_one(&self, rec: &SpanRecord) -> Result<IngestedSpan> {
        let out = self.store.ingest_span(rec).await?;

        if out.trace_created {
            self.bus.broadcast(&LiveEvent::TraceCreated {
                trace: out.trace.clone(),
            });
        }
        if out.span_created {
            self.bus.broadcast(&LiveEvent::SpanCreated {
                span: out.span.clone(),
            });
        } else {
            self.bus.broadcast(&LiveEvent::SpanUpdated {
                span_id: out.span.span_id.clone(),
                trace_id: out.span.trace_id.clone(),
                updates: serde_json::json!({
                    "status": out.span.status,
                    "end_time": out.span.end_time,
                    "duration_ms": out.span.duration_ms,
                    "error_message": out.span.error_message,
                    "attributes": out.span.attributes,
                }),
            });
        }

        Ok(out)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use bn_domain::span::{SpanStatus, SpanType};
    use serde_json::json;

    async fn harness() -> (Intake, Arc<LiveBus>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            TraceStore::open(&dir.path().join("traces.db"))
                .await
                .unwrap(),
        );
        let bus = Arc::new(LiveBus::new());
        (Intake::new(store, bus.clone()), bus, dir)
    }

    fn record(span_id: &str, trace_id: &str) -> SpanRecord {
        SpanRecord {
            span_id: span_id.into(),
            trace_id: trace_id.into(),
            parent_span_id: None,
            span_type: SpanType::ToolUse,
            name: "op".into(),
            status: SpanStatus::Ok,
            error_message: None,
            start_time: 10.0,
            end_time: Some(11.0),
            attributes: serde_json::Map::new(),
            sdk_language: None,
        }
    }

    #[tokio::test]
    async fn batch_counts_accepted_and_rejected() {
        let (intake, _bus, _dir) = harness().await;

        let values = vec![
            serde_json::to_value(record("s1", "t1")).unwrap(),
            json!({"span_id": "s2"}), // missing required fields
            json!({
                "span_id": "s3", "trace_id": "t1", "span_type": "not_a_type",
                "name": "x", "start_time": 1.0
            }),
            serde_json::to_value(record("s4", "t1")).unwrap(),
        ];
        let summary = intake.ingest_values(&values).await;
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.rejected, 2);
    }

    #[tokio::test]
    async fn events_flow_in_commit_order() {
        let (intake, bus, _dir) = harness().await;
        let (_session, mut rx) = bus.register();

        // First span of a new trace: trace_created then span_created.
        intake.ingest_one(&record("s1", "t1")).await.unwrap();
        let first: serde_json::Value =
            serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        let second: serde_json::Value =
            serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(first["event"], "trace_created");
        assert_eq!(first["trace"]["trace_id"], "t1");
        assert_eq!(second["event"], "span_created");

        // Upsert of the same span: span_updated with the new fields.
        let mut upsert = record("s1", "t1");
        upsert.status = SpanStatus::Error;
        upsert.error_message = Some("boom".into());
        intake.ingest_one(&upsert).await.unwrap();

        let third: serde_json::Value =
            serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(third["event"], "span_updated");
        assert_eq!(third["span_id"], "s1");
        assert_eq!(third["updates"]["status"], "error");
        assert_eq!(third["updates"]["error_message"], "boom");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribed_session_sees_only_its_trace_end_to_end() {
        let (intake, bus, _dir) = harness().await;
        let (session, mut rx) = bus.register();
        bus.subscribe_trace(session, "a");

        intake.ingest_one(&record("s1", "a")).await.unwrap();
        intake.ingest_one(&record("s2", "b")).await.unwrap();

        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(serde_json::from_str::<serde_json::Value>(&frame).unwrap());
        }
        // trace_created for "a" is suppressed for the subscriber; only
        // the span event for "a" arrives.
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event"], "span_created");
        assert_eq!(events[0]["span"]["trace_id"], "a");
    }
}
