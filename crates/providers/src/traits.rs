use serde_json::Value;

use bn_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic chat completion request.
///
/// Messages are raw JSON objects in the provider's own message shape.
/// Keeping them opaque lets stored prompt histories (including
/// Anthropic's content-block messages) replay without loss.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Model identifier, e.g. `gpt-4o-mini`.
    pub model: String,
    /// The conversation so far, provider-shaped.
    pub messages: Vec<Value>,
    /// Sampling temperature. `None` lets the provider choose.
    pub temperature: Option<f64>,
    /// Maximum tokens in the response. `None` lets the provider choose.
    pub max_tokens: Option<u32>,
    /// Tool definitions in the provider's own schema. Empty = no tools.
    pub tools: Vec<Value>,
}

/// A plain (no tools) completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A completion that may carry tool calls.
#[derive(Debug, Clone)]
pub struct ToolCompletion {
    /// Textual content of the response (may be empty on pure tool turns).
    pub completion: String,
    /// Normalized tool calls, provider-shaped.
    pub tool_calls: Vec<Value>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Normalized: `stop` / `tool_calls` / provider-specific passthrough.
    pub finish_reason: String,
    /// The provider's raw assistant message, needed to extend the
    /// conversation history verbatim (Anthropic content blocks).
    pub raw_message: Value,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every LLM adapter implements. Adapters translate between the
/// request types above and each provider's HTTP wire format.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Non-streaming completion.
    async fn complete(&self, req: &ChatRequest) -> Result<Completion>;

    /// Non-streaming completion with tool definitions; the model may
    /// answer with tool calls instead of (or alongside) text.
    async fn complete_with_tools(&self, req: &ChatRequest) -> Result<ToolCompletion>;

    /// Stable identifier: `openai`, `anthropic`, or `google`.
    fn provider_id(&self) -> &'static str;
}

impl std::fmt::Debug for dyn LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmProvider")
            .field("provider_id", &self.provider_id())
            .finish()
    }
}
