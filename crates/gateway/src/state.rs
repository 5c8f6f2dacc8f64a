use std::sync::Arc;

use bn_domain::config::Config;
use bn_providers::{ApiKeyStore, LlmClient};
use bn_store::TraceStore;

use crate::intake::Intake;
use crate::live::LiveBus;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Embedded trace database.
    pub store: Arc<TraceStore>,
    /// Live fanout registries for WebSocket subscribers.
    pub bus: Arc<LiveBus>,
    /// Span intake pipeline (store + bus, in commit order).
    pub intake: Arc<Intake>,
    /// Uniform LLM provider client (runner + replay).
    pub llm: Arc<LlmClient>,
    /// Per-provider API keys on disk.
    pub keys: Arc<ApiKeyStore>,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: Arc<TraceStore>) -> Self {
        let bus = Arc::new(LiveBus::new());
        let intake = Arc::new(Intake::new(store.clone(), bus.clone()));
        let keys = Arc::new(ApiKeyStore::new(config.storage.keys_path.clone()));
        let llm = Arc::new(LlmClient::new(keys.clone()));
        Self {
            config,
            store,
            bus,
            intake,
            llm,
            keys,
        }
    }
}
