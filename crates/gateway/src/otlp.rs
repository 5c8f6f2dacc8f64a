//! OTLP JSON ↔ native span conversion.
//!
//! Handles the standard `resourceSpans → scopeSpans → spans` structure.
//! Nanosecond timestamps (strings on the wire) map to float epoch
//! seconds; a zero or missing `endTimeUnixNano` means the span is still
//! in flight. `span_type` and `error.message` ride inside OTLP
//! attributes and are extracted into span fields on the way in.

use serde_json::{Map, Value};

use bn_domain::attr;
use bn_domain::span::{SpanDetail, SpanRecord, SpanStatus, SpanType};
use bn_domain::trace::TraceSummary;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OTLP → native
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Walk an OTLP JSON payload and convert every span. Spans missing
/// either id are silently dropped.
pub fn spans_from_otlp(payload: &Value) -> Vec<SpanRecord> {
    let mut records = Vec::new();
    for resource_span in array_of(payload, "resourceSpans") {
        for scope_span in array_of(resource_span, "scopeSpans") {
            for otel_span in array_of(scope_span, "spans") {
                let span_id = str_of(otel_span, "spanId");
                let trace_id = str_of(otel_span, "traceId");
                if span_id.is_empty() || trace_id.is_empty() {
                    continue;
                }
                records.push(convert_span(otel_span));
            }
        }
    }
    records
}

fn convert_span(otel_span: &Value) -> SpanRecord {
    let start_ns = nano_ts(otel_span.get("startTimeUnixNano"));
    let end_ns = nano_ts(otel_span.get("endTimeUnixNano"));
    let start_time = start_ns as f64 / NANOS_PER_SECOND;
    let end_time = (end_ns > 0).then(|| end_ns as f64 / NANOS_PER_SECOND);

    let mut attributes = flatten_attributes(otel_span.get("attributes"));

    let span_type = attributes
        .remove(attr::SPAN_TYPE)
        .and_then(|v| v.as_str().and_then(SpanType::parse))
        .unwrap_or(SpanType::Custom);

    let mut error_message = attributes
        .remove(attr::ERROR_MESSAGE)
        .and_then(|v| v.as_str().map(str::to_string));

    // OTLP status codes: 0 = unset, 1 = ok, 2 = error.
    let otel_status = otel_span.get("status");
    let status_code = otel_status
        .and_then(|s| s.get("code"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let status = match status_code {
        1 => SpanStatus::Ok,
        2 => SpanStatus::Error,
        _ => SpanStatus::Unset,
    };
    if status == SpanStatus::Error && error_message.is_none() {
        error_message = otel_status
            .and_then(|s| s.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    let name = match str_of(otel_span, "name") {
        "" => "unknown".to_string(),
        name => name.to_string(),
    };

    SpanRecord {
        span_id: str_of(otel_span, "spanId").to_string(),
        trace_id: str_of(otel_span, "traceId").to_string(),
        parent_span_id: Some(str_of(otel_span, "parentSpanId"))
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        span_type,
        name,
        status,
        error_message,
        start_time,
        end_time,
        attributes,
        sdk_language: None,
    }
}

/// `[{"key": k, "value": {"stringValue": v}}]` → flat map.
fn flatten_attributes(otel_attrs: Option<&Value>) -> Map<String, Value> {
    let mut result = Map::new();
    let Some(attrs) = otel_attrs.and_then(Value::as_array) else {
        return result;
    };
    for entry in attrs {
        let key = str_of(entry, "key");
        if key.is_empty() {
            continue;
        }
        let value = entry.get("value").cloned().unwrap_or(Value::Null);
        result.insert(key.to_string(), extract_value(&value));
    }
    result
}

/// Unwrap one OTLP typed value. Unknown wrappers stringify.
fn extract_value(value_obj: &Value) -> Value {
    if let Some(s) = value_obj.get("stringValue").and_then(Value::as_str) {
        return Value::String(s.to_string());
    }
    if let Some(v) = value_obj.get("intValue") {
        // intValue is a string on the wire, but accept bare numbers too.
        let parsed = match v {
            Value::String(s) => s.parse::<i64>().ok(),
            _ => v.as_i64(),
        };
        if let Some(i) = parsed {
            return Value::from(i);
        }
    }
    if let Some(v) = value_obj.get("doubleValue").and_then(Value::as_f64) {
        return Value::from(v);
    }
    if let Some(v) = value_obj.get("boolValue").and_then(Value::as_bool) {
        return Value::from(v);
    }
    if let Some(values) = value_obj.pointer("/arrayValue/values").and_then(Value::as_array) {
        return Value::Array(values.iter().map(extract_value).collect());
    }
    Value::String(value_obj.to_string())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Native → OTLP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the OTLP `resourceSpans` envelope for one trace.
pub fn trace_to_otlp(trace: &TraceSummary, spans: &[SpanDetail]) -> Value {
    let otel_spans: Vec<Value> = spans.iter().map(span_to_otlp).collect();
    serde_json::json!({
        "resourceSpans": [{
            "resource": {
                "attributes": [
                    {"key": "service.name", "value": {"stringValue": "beacon"}},
                    {"key": "trace.name", "value": {"stringValue": trace.name}},
                ]
            },
            "scopeSpans": [{
                "scope": {"name": "beacon", "version": env!("CARGO_PKG_VERSION")},
                "spans": otel_spans,
            }],
        }]
    })
}

fn span_to_otlp(span: &SpanDetail) -> Value {
    let start_ns = (span.start_time * NANOS_PER_SECOND) as i64;
    let end_ns = span
        .end_time
        .map(|end| (end * NANOS_PER_SECOND) as i64)
        .unwrap_or(0);

    let status_code = match span.status {
        SpanStatus::Unset => 0,
        SpanStatus::Ok => 1,
        SpanStatus::Error => 2,
    };

    let mut otel_attrs = vec![serde_json::json!({
        "key": attr::SPAN_TYPE,
        "value": {"stringValue": span.span_type.as_str()},
    })];
    for (key, value) in &span.attributes {
        otel_attrs.push(attribute_to_otlp(key, value));
    }
    if let Some(message) = &span.error_message {
        otel_attrs.push(serde_json::json!({
            "key": attr::ERROR_MESSAGE,
            "value": {"stringValue": message},
        }));
    }

    let mut result = serde_json::json!({
        "traceId": span.trace_id,
        "spanId": span.span_id,
        "name": span.name,
        "kind": 1, // SPAN_KIND_INTERNAL
        "startTimeUnixNano": start_ns.to_string(),
        "endTimeUnixNano": end_ns.to_string(),
        "attributes": otel_attrs,
        "status": {"code": status_code},
    });
    if let Some(parent) = &span.parent_span_id {
        result["parentSpanId"] = Value::String(parent.clone());
    }
    result
}

/// Wrap one native value into OTLP's typed attribute form.
fn attribute_to_otlp(key: &str, value: &Value) -> Value {
    let wrapped = match value {
        Value::Bool(b) => serde_json::json!({"boolValue": b}),
        Value::Number(n) => match n.as_i64() {
            Some(i) => serde_json::json!({"intValue": i.to_string()}),
            None => serde_json::json!({"doubleValue": n.as_f64()}),
        },
        Value::String(s) => serde_json::json!({"stringValue": s}),
        other => serde_json::json!({"stringValue": other.to_string()}),
    };
    serde_json::json!({"key": key, "value": wrapped})
}

// ── helpers ─────────────────────────────────────────────────────────

fn array_of<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter())
        .unwrap_or_default()
}

fn str_of<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

fn nano_ts(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(v) => v.as_i64().unwrap_or(0),
        None => 0,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
