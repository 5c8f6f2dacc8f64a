//! Span ingest and single-span reads.
//!
//! - `POST /v1/spans`              — native batch ingest
//! - `GET  /v1/spans/:id`          — single span
//! - `PUT  /v1/spans/:id/annotations` — replace annotations

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::Value;

use bn_domain::span::Annotation;

use crate::api::error::{api_error, error_response};
use crate::state::AppState;

pub async fn ingest(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let Some(spans) = body.get("spans").and_then(Value::as_array) else {
        return api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "body must contain a 'spans' array",
        );
    };
    let summary = state.intake.ingest_values(spans).await;
    Json(summary).into_response()
}

pub async fn get_span(State(state): State<AppState>, Path(span_id): Path<String>) -> Response {
    match state.store.get_span(&span_id).await {
        Ok(Some(span)) => Json(span).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "Span not found"),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct AnnotationsUpdateRequest {
    pub annotations: Vec<Annotation>,
}

pub async fn update_annotations(
    State(state): State<AppState>,
    Path(span_id): Path<String>,
    Json(req): Json<AnnotationsUpdateRequest>,
) -> Response {
    match state
        .store
        .update_span_annotations(&span_id, &req.annotations)
        .await
    {
        Ok(span) => Json(serde_json::json!({
            "span_id": span.span_id,
            "annotations": span.annotations,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}
