//! Native export envelopes and replay records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::span::SpanDetail;
use crate::trace::TraceSummary;

/// Wire format discriminator for native exports.
pub const EXPORT_FORMAT: &str = "beacon";
/// Current native export schema version.
pub const EXPORT_VERSION: &str = "1";

fn default_version() -> String {
    EXPORT_VERSION.into()
}

fn default_format() -> String {
    EXPORT_FORMAT.into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Export envelopes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One trace with all of its spans, in the native JSON format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceExport {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_format")]
    pub format: String,
    pub exported_at: f64,
    pub trace: TraceSummary,
    pub spans: Vec<SpanDetail>,
}

/// Several traces bundled into one envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTraceExport {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_format")]
    pub format: String,
    pub exported_at: f64,
    pub traces: Vec<TraceExport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub trace_id: String,
    pub span_count: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Replay
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayRequest {
    pub span_id: String,
    #[serde(default)]
    pub modified_attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayDiff {
    pub old_completion: String,
    pub new_completion: String,
    pub changed: bool,
}

/// A persisted replay execution, keyed by `replay_id` and cascade-deleted
/// with either the original span or its trace.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayRun {
    pub replay_id: String,
    pub original_span_id: String,
    pub trace_id: String,
    pub modified_input: Map<String, Value>,
    pub new_output: Map<String, Value>,
    pub diff: ReplayDiff,
    pub created_at: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayResponse {
    pub replay_id: String,
    pub original_span_id: String,
    pub new_output: Map<String, Value>,
    pub diff: ReplayDiff,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_defaults_apply_on_deserialize() {
        let json = r#"{
            "exported_at": 1.0,
            "trace": {
                "trace_id": "t1",
                "name": "run",
                "start_time": 1.0,
                "end_time": null,
                "duration_ms": null,
                "span_count": 0,
                "status": "unset",
                "total_cost_usd": 0.0,
                "total_tokens": 0
            },
            "spans": []
        }"#;
        let export: TraceExport = serde_json::from_str(json).unwrap();
        assert_eq!(export.version, EXPORT_VERSION);
        assert_eq!(export.format, EXPORT_FORMAT);
    }
}
