//! LLM provider adapters for the Beacon backend: a uniform
//! non-streaming and tool-calling interface over OpenAI, Anthropic, and
//! Google, plus model→provider resolution, a price table, and the
//! on-disk API-key store.

mod anthropic;
mod google;
mod openai;
mod util;

pub mod keys;
pub mod pricing;
pub mod registry;
pub mod traits;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use keys::{ApiKeyStore, KeyStatus, SUPPORTED_PROVIDERS};
pub use openai::OpenAiProvider;
pub use pricing::estimate_cost;
pub use registry::{provider_for_model, LlmClient, ProviderKind};
pub use traits::{ChatRequest, Completion, LlmProvider, ToolCompletion};
