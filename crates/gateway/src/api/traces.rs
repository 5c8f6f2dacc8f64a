//! Trace listing, detail, graph, tags, deletion, export, and import.

use std::collections::BTreeMap;

use axum::extract::{Json, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::Value;

use bn_domain::attr;
use bn_domain::export::TraceExport;
use bn_domain::span::SpanStatus;
use bn_domain::trace::{
    GraphData, GraphEdge, GraphNode, GraphNodeData, GraphPosition, TraceDetail, TracePage,
};

use crate::api::error::{api_error, error_response};
use crate::export;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/traces
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
    status: Option<String>,
}

fn default_limit() -> i64 {
    50
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    let limit = query.limit.clamp(1, 200);
    let offset = query.offset.max(0);
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => match SpanStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return api_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("invalid status filter: {raw}"),
                )
            }
        },
    };

    match state.store.list_traces(limit, offset, status).await {
        Ok((traces, total)) => Json(TracePage {
            traces,
            total,
            limit,
            offset,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/traces/:id  +  /graph
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn detail(State(state): State<AppState>, Path(trace_id): Path<String>) -> Response {
    match state.store.get_trace_detail(&trace_id).await {
        Ok(Some(detail)) => Json(detail).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "Trace not found"),
        Err(e) => error_response(&e),
    }
}

pub async fn graph(State(state): State<AppState>, Path(trace_id): Path<String>) -> Response {
    match state.store.get_trace_detail(&trace_id).await {
        Ok(Some(detail)) => Json(build_graph(&detail)).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "Trace not found"),
        Err(e) => error_response(&e),
    }
}

/// Nodes and edges for UI layout. Positions are all at the origin; the
/// client computes the actual layout.
fn build_graph(detail: &TraceDetail) -> GraphData {
    let mut nodes = Vec::with_capacity(detail.spans.len());
    let mut edges = Vec::new();

    for (sequence, span) in detail.spans.iter().enumerate() {
        nodes.push(GraphNode {
            id: span.span_id.clone(),
            node_type: "spanNode".into(),
            data: GraphNodeData {
                span_id: span.span_id.clone(),
                span_type: span.span_type,
                name: span.name.clone(),
                status: span.status,
                duration_ms: span.duration_ms,
                cost_usd: span
                    .attributes
                    .get(attr::LLM_COST_USD)
                    .and_then(Value::as_f64),
                sequence,
                framework: span
                    .attributes
                    .get(attr::AGENT_FRAMEWORK)
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            position: GraphPosition { x: 0.0, y: 0.0 },
        });

        if let Some(parent) = &span.parent_span_id {
            edges.push(GraphEdge {
                id: format!("edge-{parent}-{}", span.span_id),
                source: parent.clone(),
                target: span.span_id.clone(),
            });
        }
    }

    GraphData { nodes, edges }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /v1/traces/:id/tags
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
pub struct TagsUpdateRequest {
    pub tags: BTreeMap<String, String>,
}

pub async fn update_tags(
    State(state): State<AppState>,
    Path(trace_id): Path<String>,
    Json(req): Json<TagsUpdateRequest>,
) -> Response {
    match state.store.update_trace_tags(&trace_id, &req.tags).await {
        Ok(trace) => Json(serde_json::json!({
            "trace_id": trace.trace_id,
            "tags": trace.tags,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /v1/traces/:id  +  batch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn delete_one(
    State(state): State<AppState>,
    Path(trace_id): Path<String>,
) -> Response {
    match state.store.delete_trace(&trace_id).await {
        Ok(true) => Json(serde_json::json!({"deleted_count": 1})).into_response(),
        Ok(false) => api_error(StatusCode::NOT_FOUND, "Trace not found"),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct DeleteTracesRequest {
    pub trace_ids: Option<Vec<String>>,
    pub older_than: Option<f64>,
}

pub async fn delete_batch(
    State(state): State<AppState>,
    Json(req): Json<DeleteTracesRequest>,
) -> Response {
    if req.trace_ids.is_none() && req.older_than.is_none() {
        return api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Provide trace_ids or older_than",
        );
    }
    match state
        .store
        .delete_traces_batch(req.trace_ids.as_deref(), req.older_than)
        .await
    {
        Ok(deleted) => Json(serde_json::json!({"deleted_count": deleted})).into_response(),
        Err(e) => error_response(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Export / Import
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
pub struct ExportQuery {
    #[serde(default = "default_format")]
    format: String,
}

fn default_format() -> String {
    "json".into()
}

pub async fn export_one(
    State(state): State<AppState>,
    Path(trace_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Response {
    match query.format.as_str() {
        "json" => match export::export_trace_json(&state.store, &trace_id).await {
            Ok(Some(data)) => Json(data).into_response(),
            Ok(None) => api_error(StatusCode::NOT_FOUND, "Trace not found"),
            Err(e) => error_response(&e),
        },
        "otel" => match export::export_trace_otlp(&state.store, &trace_id).await {
            Ok(Some(data)) => attachment_response(
                serde_json::to_string_pretty(&data).unwrap_or_default(),
                "application/json",
                &format!("trace-{}-otel.json", short_id(&trace_id)),
            ),
            Ok(None) => api_error(StatusCode::NOT_FOUND, "Trace not found"),
            Err(e) => error_response(&e),
        },
        "csv" => match export::export_trace_csv(&state.store, &trace_id).await {
            Ok(Some(data)) => attachment_response(
                data,
                "text/csv",
                &format!("trace-{}.csv", short_id(&trace_id)),
            ),
            Ok(None) => api_error(StatusCode::NOT_FOUND, "Trace not found"),
            Err(e) => error_response(&e),
        },
        other => api_error(
            StatusCode::BAD_REQUEST,
            format!("unsupported export format: {other}"),
        ),
    }
}

#[derive(Deserialize)]
pub struct BulkExportQuery {
    trace_ids: Option<String>,
    #[serde(default = "default_format")]
    format: String,
}

pub async fn bulk_export(
    State(state): State<AppState>,
    Query(query): Query<BulkExportQuery>,
) -> Response {
    if query.format != "json" {
        return api_error(
            StatusCode::BAD_REQUEST,
            "Bulk export only supports JSON format",
        );
    }
    let ids: Vec<String> = query
        .trace_ids
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Provide trace_ids query parameter (comma-separated)",
        );
    }

    match export::export_bulk(&state.store, &ids).await {
        Ok(bulk) => Json(bulk).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn import(
    State(state): State<AppState>,
    Json(data): Json<TraceExport>,
) -> Response {
    match export::import_trace(&state.store, &data).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(&e),
    }
}

// ── helpers ─────────────────────────────────────────────────────────

fn short_id(trace_id: &str) -> String {
    trace_id.chars().take(8).collect()
}

fn attachment_response(body: String, content_type: &str, filename: &str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}
