//! API-key management for the LLM providers.

use axum::extract::{Json, Path, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::api::error::error_response;
use crate::state::AppState;

pub async fn list_keys(State(state): State<AppState>) -> Response {
    Json(state.keys.list()).into_response()
}

#[derive(Deserialize)]
pub struct ApiKeySetRequest {
    pub provider: String,
    pub api_key: String,
}

pub async fn set_key(
    State(state): State<AppState>,
    Json(req): Json<ApiKeySetRequest>,
) -> Response {
    match state.keys.set(&req.provider, &req.api_key) {
        Ok(()) => Json(serde_json::json!({
            "provider": req.provider,
            "configured": true,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn delete_key(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Response {
    match state.keys.delete(&provider) {
        Ok(()) => Json(serde_json::json!({
            "provider": provider,
            "configured": false,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}
