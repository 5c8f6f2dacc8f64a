//! Health and database statistics.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::error::error_response;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "db_path": state.store.db_path().display().to_string(),
    }))
    .into_response()
}

pub async fn stats(State(state): State<AppState>) -> Response {
    match state.store.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => error_response(&e),
    }
}
