//! OTLP-compatible trace ingestion endpoint.

use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::otlp::spans_from_otlp;
use crate::state::AppState;

/// `POST /v1/otlp/traces` — accept an OTLP JSON payload and ingest its
/// spans through the native pipeline.
pub async fn ingest(State(state): State<AppState>, Json(payload): Json<Value>) -> Response {
    let records = spans_from_otlp(&payload);
    let summary = state.intake.ingest_batch(&records).await;
    Json(summary).into_response()
}
