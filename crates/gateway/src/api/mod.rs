pub mod demo;
pub mod error;
pub mod otlp;
pub mod prompt_versions;
pub mod replay;
pub mod settings;
pub mod spans;
pub mod stats;
pub mod traces;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health probe (outside the /v1 prefix)
        .route("/health", get(stats::health))
        // Span ingest + reads
        .route("/v1/spans", post(spans::ingest))
        .route("/v1/spans/:span_id", get(spans::get_span))
        .route(
            "/v1/spans/:span_id/annotations",
            put(spans::update_annotations),
        )
        .route(
            "/v1/spans/:span_id/prompt-versions",
            get(prompt_versions::list).post(prompt_versions::create),
        )
        // OTLP ingest
        .route("/v1/otlp/traces", post(otlp::ingest))
        // Traces
        .route("/v1/traces", get(traces::list).delete(traces::delete_batch))
        .route("/v1/traces/export", get(traces::bulk_export))
        .route("/v1/traces/import", post(traces::import))
        .route(
            "/v1/traces/:trace_id",
            get(traces::detail).delete(traces::delete_one),
        )
        .route("/v1/traces/:trace_id/graph", get(traces::graph))
        .route("/v1/traces/:trace_id/export", get(traces::export_one))
        .route("/v1/traces/:trace_id/tags", put(traces::update_tags))
        // Replay
        .route("/v1/replay", post(replay::replay))
        // Demo agents
        .route("/v1/demo/scenarios", get(demo::list_scenarios))
        .route("/v1/demo/run", post(demo::run))
        // Settings (provider API keys)
        .route(
            "/v1/settings/api-keys",
            get(settings::list_keys).post(settings::set_key),
        )
        .route(
            "/v1/settings/api-keys/:provider",
            delete(settings::delete_key),
        )
        // Stats
        .route("/v1/stats", get(stats::stats))
        // Live fanout
        .route("/v1/ws/live", get(crate::live::ws::live_ws))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
