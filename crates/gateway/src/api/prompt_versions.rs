//! Prompt version CRUD for `llm_call` spans.

use axum::extract::{Json, Path, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::api::error::error_response;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>, Path(span_id): Path<String>) -> Response {
    match state.store.list_prompt_versions(&span_id).await {
        Ok(versions) => Json(serde_json::json!({"versions": versions})).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct PromptVersionCreate {
    pub prompt_text: String,
    pub label: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Path(span_id): Path<String>,
    Json(req): Json<PromptVersionCreate>,
) -> Response {
    match state
        .store
        .create_prompt_version(&span_id, &req.prompt_text, req.label.as_deref())
        .await
    {
        Ok(version) => Json(version).into_response(),
        Err(e) => error_response(&e),
    }
}
