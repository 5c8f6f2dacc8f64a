//! Google Gemini `generateContent` adapter.
//!
//! OpenAI-style role/content messages are converted to Gemini `contents`
//! (`assistant` → `model`), with system messages lifted into
//! `systemInstruction`. Tool calling is not wired for Gemini; the
//! tool-calling entry point reports the capability as unsupported.

use serde_json::Value;

use bn_domain::error::{Error, Result};

use crate::traits::{ChatRequest, Completion, LlmProvider, ToolCompletion};
use crate::util::{from_reqwest, upstream_error};

const PROVIDER_ID: &str = "google";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GoogleProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        }
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let mut system_instruction: Option<String> = None;
        let mut contents: Vec<Value> = Vec::new();

        for msg in &req.messages {
            let role = msg.get("role").and_then(Value::as_str).unwrap_or("");
            let text = msg.get("content").and_then(Value::as_str).unwrap_or("");
            if role == "system" {
                system_instruction = Some(text.to_string());
            } else {
                let gemini_role = if role == "user" { "user" } else { "model" };
                contents.push(serde_json::json!({
                    "role": gemini_role,
                    "parts": [{"text": text}],
                }));
            }
        }

        let mut generation_config = serde_json::json!({
            "temperature": req.temperature.unwrap_or(1.0),
        });
        if let Some(max_tokens) = req.max_tokens {
            generation_config["maxOutputTokens"] = serde_json::json!(max_tokens);
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(text) = system_instruction {
            body["systemInstruction"] = serde_json::json!({"parts": [{"text": text}]});
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn parse_completion(body: &Value) -> Result<Completion> {
    let candidates = body
        .get("candidates")
        .and_then(Value::as_array)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Provider {
            provider: PROVIDER_ID.into(),
            message: "empty response (no candidates)".into(),
        })?;

    let text: String = candidates[0]
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    let usage = body.get("usageMetadata");
    let input_tokens = usage
        .and_then(|u| u.get("promptTokenCount"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    let output_tokens = usage
        .and_then(|u| u.get("candidatesTokenCount"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;

    Ok(Completion {
        text,
        input_tokens,
        output_tokens,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for GoogleProvider {
    async fn complete(&self, req: &ChatRequest) -> Result<Completion> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, req.model
        );
        let body = self.build_body(req);
        tracing::debug!(url = %url, "google chat request");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
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
        let body: Value = serde_json::from_str(&text)?;
        parse_completion(&body)
    }

    async fn complete_with_tools(&self, _req: &ChatRequest) -> Result<ToolCompletion> {
        Err(Error::Provider {
            provider: PROVIDER_ID.into(),
            message: "tool calling is not supported for Gemini; use an OpenAI or \
                      Anthropic model"
                .into(),
        })
    }

    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
