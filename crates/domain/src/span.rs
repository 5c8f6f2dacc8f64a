//! Span records — the unit of work observed during an agent run.
//!
//! A span arrives over the wire as a [`SpanRecord`], is persisted by the
//! store, and is read back as a [`SpanDetail`] with computed fields.
//! The same `span_id` may be written twice: first in-flight
//! (`status = unset`, `end_time = None`), then complete. The second write
//! updates the stored row in place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Enums
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanType {
    LlmCall,
    ToolUse,
    AgentStep,
    BrowserAction,
    FileOperation,
    ShellCommand,
    Chain,
    Custom,
}

impl SpanType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LlmCall => "llm_call",
            Self::ToolUse => "tool_use",
            Self::AgentStep => "agent_step",
            Self::BrowserAction => "browser_action",
            Self::FileOperation => "file_operation",
            Self::ShellCommand => "shell_command",
            Self::Chain => "chain",
            Self::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "llm_call" => Some(Self::LlmCall),
            "tool_use" => Some(Self::ToolUse),
            "agent_step" => Some(Self::AgentStep),
            "browser_action" => Some(Self::BrowserAction),
            "file_operation" => Some(Self::FileOperation),
            "shell_command" => Some(Self::ShellCommand),
            "chain" => Some(Self::Chain),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Ok,
    Error,
    Unset,
}

impl SpanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Unset => "unset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "error" => Some(Self::Error),
            "unset" => Some(Self::Unset),
            _ => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire-in record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A span as submitted by a producer (native batch ingest, OTLP adapter,
/// or the agent runner). Times are epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanRecord {
    pub span_id: String,
    pub trace_id: String,
    #[serde(default)]
    pub parent_span_id: Option<String>,
    pub span_type: SpanType,
    pub name: String,
    #[serde(default = "default_status")]
    pub status: SpanStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    pub start_time: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub sdk_language: Option<String>,
}

fn default_status() -> SpanStatus {
    SpanStatus::Unset
}

impl SpanRecord {
    /// Check the invariants serde cannot express. Invalid spans are
    /// rejected by intake without failing the rest of the batch.
    pub fn validate(&self) -> Result<()> {
        if self.span_id.is_empty() {
            return Err(Error::Validation("span_id must not be empty".into()));
        }
        if self.trace_id.is_empty() {
            return Err(Error::Validation("trace_id must not be empty".into()));
        }
        if self.name.is_empty() {
            return Err(Error::Validation("name must not be empty".into()));
        }
        if !self.start_time.is_finite() {
            return Err(Error::Validation("start_time must be finite".into()));
        }
        if let Some(end) = self.end_time {
            if !end.is_finite() {
                return Err(Error::Validation("end_time must be finite".into()));
            }
        }
        Ok(())
    }

    /// Whether this span is the root of its trace.
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire-out record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A free-form note attached to a span by a human.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub text: String,
    pub created_at: f64,
}

/// A materialized span read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanDetail {
    pub span_id: String,
    pub trace_id: String,
    pub parent_span_id: Option<String>,
    pub span_type: SpanType,
    pub name: String,
    pub status: SpanStatus,
    pub error_message: Option<String>,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub duration_ms: Option<f64>,
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub sdk_language: Option<String>,
}

impl SpanDetail {
    /// Convert back into the wire-in form, e.g. when re-importing an
    /// exported trace.
    pub fn to_record(&self) -> SpanRecord {
        SpanRecord {
            span_id: self.span_id.clone(),
            trace_id: self.trace_id.clone(),
            parent_span_id: self.parent_span_id.clone(),
            span_type: self.span_type,
            name: self.name.clone(),
            status: self.status,
            error_message: self.error_message.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            attributes: self.attributes.clone(),
            sdk_language: self.sdk_language.clone(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompt versions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A saved revision of an `llm_call` span's prompt text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVersion {
    pub version_id: String,
    pub span_id: String,
    pub prompt_text: String,
    pub label: Option<String>,
    pub created_at: f64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn record(span_id: &str, trace_id: &str) -> SpanRecord {
        SpanRecord {
            span_id: span_id.into(),
            trace_id: trace_id.into(),
            parent_span_id: None,
            span_type: SpanType::Custom,
            name: "op".into(),
            status: SpanStatus::Unset,
            error_message: None,
            start_time: 100.0,
            end_time: None,
            attributes: Map::new(),
            sdk_language: None,
        }
    }

    #[test]
    fn enum_roundtrip() {
        for ty in [
            SpanType::LlmCall,
            SpanType::ToolUse,
            SpanType::AgentStep,
            SpanType::BrowserAction,
            SpanType::FileOperation,
            SpanType::ShellCommand,
            SpanType::Chain,
            SpanType::Custom,
        ] {
            assert_eq!(SpanType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(SpanType::parse("bogus"), None);
        for st in [SpanStatus::Ok, SpanStatus::Error, SpanStatus::Unset] {
            assert_eq!(SpanStatus::parse(st.as_str()), Some(st));
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&SpanType::LlmCall).unwrap();
        assert_eq!(json, r#""llm_call""#);
        let ty: SpanType = serde_json::from_str(r#""shell_command""#).unwrap();
        assert_eq!(ty, SpanType::ShellCommand);
    }

    #[test]
    fn status_defaults_to_unset() {
        let json = r#"{
            "span_id": "s1",
            "trace_id": "t1",
            "span_type": "tool_use",
            "name": "grep",
            "start_time": 5.0
        }"#;
        let rec: SpanRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.status, SpanStatus::Unset);
        assert!(rec.end_time.is_none());
        assert!(rec.attributes.is_empty());
    }

    #[test]
    fn validate_rejects_empty_ids() {
        assert!(record("", "t1").validate().is_err());
        assert!(record("s1", "").validate().is_err());
        assert!(record("s1", "t1").validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_finite_times() {
        let mut rec = record("s1", "t1");
        rec.start_time = f64::NAN;
        assert!(rec.validate().is_err());

        let mut rec = record("s1", "t1");
        rec.end_time = Some(f64::INFINITY);
        assert!(rec.validate().is_err());
    }
}
