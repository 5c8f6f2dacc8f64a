//! Trace summaries and the derived-column contract.
//!
//! A trace row is never written directly by callers; its derived columns
//! (`span_count`, time window, totals, status) are recomputed by the store
//! as spans arrive.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::span::{SpanDetail, SpanStatus, SpanType};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Summaries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSummary {
    pub trace_id: String,
    pub name: String,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub duration_ms: Option<f64>,
    pub span_count: i64,
    pub status: SpanStatus,
    pub total_cost_usd: f64,
    pub total_tokens: i64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub sdk_language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceDetail {
    #[serde(flatten)]
    pub summary: TraceSummary,
    pub spans: Vec<SpanDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TracePage {
    pub traces: Vec<TraceSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ingest outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What a single committed span write produced, returned by the store so
/// the gateway can fan events out in commit order.
#[derive(Debug, Clone)]
pub struct IngestedSpan {
    /// The span as materialized after the write.
    pub span: SpanDetail,
    /// The parent trace's derived state after the write.
    pub trace: TraceSummary,
    /// True when this write created the trace row.
    pub trace_created: bool,
    /// True when this write inserted a new span row (false on upsert).
    pub span_created: bool,
}

/// Batch ingest counters (the intake path is hot; no per-span detail).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IngestSummary {
    pub accepted: usize,
    pub rejected: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Graph view
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct GraphNodeData {
    pub span_id: String,
    pub span_type: SpanType,
    pub name: String,
    pub status: SpanStatus,
    pub duration_ms: Option<f64>,
    pub cost_usd: Option<f64>,
    /// Index of the span in start-time order within the trace.
    pub sequence: usize,
    pub framework: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub data: GraphNodeData,
    /// Layout is computed client-side; positions are always the origin.
    pub position: GraphPosition,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stats
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub database_size_bytes: u64,
    pub total_traces: i64,
    pub total_spans: i64,
    pub oldest_trace_timestamp: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_detail_flattens_summary() {
        let detail = TraceDetail {
            summary: TraceSummary {
                trace_id: "t1".into(),
                name: "run".into(),
                start_time: 1.0,
                end_time: Some(3.0),
                duration_ms: Some(2000.0),
                span_count: 2,
                status: SpanStatus::Ok,
                total_cost_usd: 0.5,
                total_tokens: 100,
                tags: BTreeMap::new(),
                sdk_language: None,
            },
            spans: vec![],
        };
        let v = serde_json::to_value(&detail).unwrap();
        assert_eq!(v["trace_id"], "t1");
        assert_eq!(v["span_count"], 2);
        assert!(v["spans"].as_array().unwrap().is_empty());
    }
}
