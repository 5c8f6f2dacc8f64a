//! Replay an LLM span with modified attributes.

use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};

use bn_domain::export::ReplayRequest;

use crate::api::error::error_response;
use crate::runtime::replay::replay_span;
use crate::state::AppState;

/// `POST /v1/replay` — re-invoke the provider with the merged
/// attributes, persist a replay run, and return the diff. The original
/// span is untouched.
pub async fn replay(State(state): State<AppState>, Json(req): Json<ReplayRequest>) -> Response {
    match replay_span(&state.store, &state.llm, &req).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(&e),
    }
}
