//! Anthropic Messages API adapter.
//!
//! System messages travel in the top-level `system` field; tool results
//! arrive as user messages carrying `tool_result` content blocks, which
//! callers append to the history themselves (the raw assistant message is
//! returned for that purpose).

use serde_json::Value;

use bn_domain::error::Result;

use crate::traits::{ChatRequest, Completion, LlmProvider, ToolCompletion};
use crate::util::{from_reqwest, upstream_error};

const PROVIDER_ID: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        }
    }

    fn build_body(&self, req: &ChatRequest, with_tools: bool) -> Value {
        // Pull system messages out into the top-level field.
        let mut system_parts: Vec<String> = Vec::new();
        let mut messages: Vec<Value> = Vec::new();
        for msg in &req.messages {
            let role = msg.get("role").and_then(Value::as_str).unwrap_or("");
            if role == "system" {
                if let Some(text) = msg.get("content").and_then(Value::as_str) {
                    system_parts.push(text.to_string());
                }
            } else {
                messages.push(msg.clone());
            }
        }

        let mut body = serde_json::json!({
            "model": req.model,
            "messages": messages,
            "temperature": req.temperature.unwrap_or(1.0),
            "max_tokens": req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });
        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        if with_tools && !req.tools.is_empty() {
            body["tools"] = Value::Array(req.tools.clone());
        }
        body
    }

    async fn post_messages(&self, body: &Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(url = %url, "anthropic chat request");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| from_reqwest(PROVIDER_ID, e))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| from_reqwest(PROVIDER_ID, e))?;
        if !status.is_success() {
            return Err(upstream_error(PROVIDER_ID, status.as_u16(), &text));
        }
        serde_json::from_str(&text).map_err(Into::into)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn usage_tokens(body: &Value) -> (u32, u32) {
    let usage = body.get("usage");
    let input = usage
        .and_then(|u| u.get("input_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    let output = usage
        .and_then(|u| u.get("output_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    (input, output)
}

fn content_blocks(body: &Value) -> Vec<Value> {
    body.get("content")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn text_of(blocks: &[Value]) -> String {
    blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect()
}

/// Map Anthropic stop reasons onto the normalized vocabulary.
fn normalize_stop_reason(reason: Option<&str>) -> String {
    match reason {
        Some("end_turn") | None => "stop".to_string(),
        Some("tool_use") => "tool_calls".to_string(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn parse_completion(body: &Value) -> Result<Completion> {
    let blocks = content_blocks(body);
    let (input_tokens, output_tokens) = usage_tokens(body);
    Ok(Completion {
        text: text_of(&blocks),
        input_tokens,
        output_tokens,
    })
}

pub(crate) fn parse_tool_completion(body: &Value) -> Result<ToolCompletion> {
    let blocks = content_blocks(body);
    let completion = text_of(&blocks);

    let tool_calls: Vec<Value> = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("tool_use"))
        .map(|b| {
            serde_json::json!({
                "id": b.get("id").and_then(Value::as_str).unwrap_or(""),
                "name": b.get("name").and_then(Value::as_str).unwrap_or(""),
                "input": b.get("input").cloned().unwrap_or_else(|| serde_json::json!({})),
            })
        })
        .collect();

    let finish_reason =
        normalize_stop_reason(body.get("stop_reason").and_then(Value::as_str));
    let (input_tokens, output_tokens) = usage_tokens(body);

    Ok(ToolCompletion {
        completion,
        tool_calls,
        input_tokens,
        output_tokens,
        finish_reason,
        raw_message: serde_json::json!({ "content": blocks }),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, req: &ChatRequest) -> Result<Completion> {
        let body = self.build_body(req, false);
        let resp = self.post_messages(&body).await?;
        parse_completion(&resp)
    }

    async fn complete_with_tools(&self, req: &ChatRequest) -> Result<ToolCompletion> {
        let body = self.build_body(req, true);
        let resp = self.post_messages(&body).await?;
        parse_tool_completion(&resp)
    }

    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
