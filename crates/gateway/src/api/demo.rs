//! Demo agent endpoints: list scenarios, launch a run.

use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::api::error::error_response;
use crate::runtime::runner;
use crate::state::AppState;

pub async fn list_scenarios(State(state): State<AppState>) -> Response {
    Json(runner::list_scenarios(&state.llm)).into_response()
}

#[derive(Deserialize)]
pub struct DemoRunRequest {
    pub scenario: String,
}

/// `POST /v1/demo/run` — returns the new trace id immediately; the
/// agent loop continues as a background task.
pub async fn run(State(state): State<AppState>, Json(req): Json<DemoRunRequest>) -> Response {
    match runner::start_scenario(state.intake.clone(), state.llm.clone(), &req.scenario).await
    {
        Ok(trace_id) => Json(serde_json::json!({"trace_id": trace_id})).into_response(),
        Err(e) => error_response(&e),
    }
}
