//! OpenAI chat-completions adapter.
//!
//! Covers plain and tool-calling completions against
//! `POST {base}/v1/chat/completions`.

use serde_json::Value;

use bn_domain::error::{Error, Result};

use crate::traits::{ChatRequest, Completion, LlmProvider, ToolCompletion};
use crate::util::{from_reqwest, upstream_error};

const PROVIDER_ID: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        }
    }

    fn build_body(&self, req: &ChatRequest, with_tools: bool) -> Value {
        let mut body = serde_json::json!({
            "model": req.model,
            "messages": req.messages,
            "temperature": req.temperature.unwrap_or(1.0),
        });
        if let Some(max_tokens) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if with_tools && !req.tools.is_empty() {
            body["tools"] = Value::Array(req.tools.clone());
        }
        body
    }

    async fn post_chat(&self, body: &Value) -> Result<Value> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!(url = %url, "openai chat request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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

fn first_choice(body: &Value) -> Result<&Value> {
    body.get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| Error::Provider {
            provider: PROVIDER_ID.into(),
            message: "empty or invalid response (no choices)".into(),
        })
}

fn usage_tokens(body: &Value) -> (u32, u32) {
    let usage = body.get("usage");
    let input = usage
        .and_then(|u| u.get("prompt_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    let output = usage
        .and_then(|u| u.get("completion_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    (input, output)
}

pub(crate) fn parse_completion(body: &Value) -> Result<Completion> {
    let choice = first_choice(body)?;
    let text = choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let (input_tokens, output_tokens) = usage_tokens(body);
    Ok(Completion {
        text,
        input_tokens,
        output_tokens,
    })
}

pub(crate) fn parse_tool_completion(body: &Value) -> Result<ToolCompletion> {
    let choice = first_choice(body)?;
    let message = choice.get("message").cloned().unwrap_or(Value::Null);

    let completion = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let finish_reason = choice
        .get("finish_reason")
        .and_then(Value::as_str)
        .unwrap_or("stop")
        .to_string();

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.get("id").and_then(Value::as_str).unwrap_or(""),
                        "type": "function",
                        "function": {
                            "name": tc.pointer("/function/name")
                                .and_then(Value::as_str).unwrap_or(""),
                            "arguments": tc.pointer("/function/arguments")
                                .and_then(Value::as_str).unwrap_or("{}"),
                        }
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let (input_tokens, output_tokens) = usage_tokens(body);

    Ok(ToolCompletion {
        completion,
        tool_calls,
        input_tokens,
        output_tokens,
        finish_reason,
        raw_message: message,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, req: &ChatRequest) -> Result<Completion> {
        let body = self.build_body(req, false);
        let resp = self.post_chat(&body).await?;
        parse_completion(&resp)
    }

    async fn complete_with_tools(&self, req: &ChatRequest) -> Result<ToolCompletion> {
        let body = self.build_body(req, true);
        let resp = self.post_chat(&body).await?;
        parse_tool_completion(&resp)
    }

    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_plain_completion() {
        let body = json!({
            "choices": [{"message": {"content": "hi there"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let c = parse_completion(&body).unwrap();
        assert_eq!(c.text, "hi there");
        assert_eq!(c.input_tokens, 12);
        assert_eq!(c.output_tokens, 3);
    }

    #[test]
    fn parse_missing_choices_is_an_error() {
        let err = parse_completion(&json!({"usage": {}})).unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn parse_tool_calls_normalized() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "web_search", "arguments": "{\"query\":\"x\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 50, "completion_tokens": 10}
        });
        let c = parse_tool_completion(&body).unwrap();
        assert_eq!(c.completion, "");
        assert_eq!(c.finish_reason, "tool_calls");
        assert_eq!(c.tool_calls.len(), 1);
        assert_eq!(c.tool_calls[0]["function"]["name"], "web_search");
        assert_eq!(c.tool_calls[0]["id"], "call_1");
        // Raw message preserved for history extension.
        assert!(c.raw_message.get("tool_calls").is_some());
    }

    #[test]
    fn body_includes_tools_only_when_present() {
        let provider = OpenAiProvider::new(reqwest::Client::new(), "sk-test".into());
        let mut req = ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![json!({"role": "user", "content": "hello"})],
            temperature: Some(0.7),
            max_tokens: None,
            tools: vec![],
        };
        let body = provider.build_body(&req, true);
        assert!(body.get("tools").is_none());
        assert_eq!(body["temperature"], 0.7);

        req.tools = vec![json!({"type": "function"})];
        let body = provider.build_body(&req, true);
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
    }
}
