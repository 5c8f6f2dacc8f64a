//! Replay an `llm_call` span with modified attributes and persist the
//! outcome alongside the original (which is never touched).

use serde_json::{Map, Value};
use uuid::Uuid;

use bn_domain::attr;
use bn_domain::error::{Error, Result};
use bn_domain::export::{ReplayDiff, ReplayRequest, ReplayResponse, ReplayRun};
use bn_domain::now_epoch;
use bn_domain::span::SpanType;
use bn_providers::{estimate_cost, provider_for_model, ChatRequest, LlmClient, ProviderKind};
use bn_store::TraceStore;

pub async fn replay_span(
    store: &TraceStore,
    llm: &LlmClient,
    req: &ReplayRequest,
) -> Result<ReplayResponse> {
    let span = store
        .get_span(&req.span_id)
        .await?
        .ok_or_else(|| Error::BadRequest("Span not found".into()))?;
    if span.span_type != SpanType::LlmCall {
        return Err(Error::BadRequest(
            "Replay only supported for llm_call spans".into(),
        ));
    }

    // Shallow override of the stored attributes.
    let mut merged = span.attributes.clone();
    for (key, value) in &req.modified_attributes {
        merged.insert(key.clone(), value.clone());
    }

    let model = merged
        .get(attr::LLM_MODEL)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let provider_kind = resolve_provider(&merged, &model)?;
    let messages = prompt_messages(&merged)?;
    let temperature = merged
        .get(attr::LLM_TEMPERATURE)
        .and_then(Value::as_f64)
        .unwrap_or(1.0);
    let max_tokens = merged
        .get(attr::LLM_MAX_TOKENS)
        .and_then(Value::as_u64)
        .map(|v| v as u32);

    let provider = llm.provider(provider_kind)?;
    let completion = provider
        .complete(&ChatRequest {
            model: model.clone(),
            messages,
            temperature: Some(temperature),
            max_tokens,
            tools: vec![],
        })
        .await?;

    let old_completion = span
        .attributes
        .get(attr::LLM_COMPLETION)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let diff = ReplayDiff {
        changed: old_completion != completion.text,
        old_completion,
        new_completion: completion.text.clone(),
    };

    let cost = estimate_cost(&model, completion.input_tokens, completion.output_tokens);
    let mut new_output = Map::new();
    new_output.insert(attr::LLM_COMPLETION.into(), Value::String(completion.text));
    new_output.insert(
        attr::LLM_TOKENS_INPUT.into(),
        Value::from(completion.input_tokens),
    );
    new_output.insert(
        attr::LLM_TOKENS_OUTPUT.into(),
        Value::from(completion.output_tokens),
    );
    new_output.insert(attr::LLM_COST_USD.into(), Value::from(cost));

    let run = ReplayRun {
        replay_id: Uuid::new_v4().to_string(),
        original_span_id: span.span_id.clone(),
        trace_id: span.trace_id.clone(),
        modified_input: req.modified_attributes.clone(),
        new_output: new_output.clone(),
        diff: diff.clone(),
        created_at: now_epoch(),
    };
    store.insert_replay_run(&run).await?;

    tracing::info!(
        span_id = %span.span_id,
        replay_id = %run.replay_id,
        changed = diff.changed,
        "replayed llm call"
    );

    Ok(ReplayResponse {
        replay_id: run.replay_id,
        original_span_id: run.original_span_id,
        new_output,
        diff,
    })
}

/// Provider from `llm.provider`, falling back to the model's prefix
/// family when the attribute is absent or unrecognized.
fn resolve_provider(merged: &Map<String, Value>, model: &str) -> Result<ProviderKind> {
    if let Some(name) = merged.get(attr::LLM_PROVIDER).and_then(Value::as_str) {
        if let Some(kind) = ProviderKind::parse(name) {
            return Ok(kind);
        }
        if !name.is_empty() {
            return Err(Error::BadRequest(format!("Unsupported provider: {name}")));
        }
    }
    provider_for_model(model)
}

/// `llm.prompt` holds either a JSON-encoded string or an inline array
/// of messages.
fn prompt_messages(merged: &Map<String, Value>) -> Result<Vec<Value>> {
    match merged.get(attr::LLM_PROMPT) {
        Some(Value::String(raw)) => serde_json::from_str(raw)
            .map_err(|e| Error::BadRequest(format!("llm.prompt is not valid JSON: {e}"))),
        Some(Value::Array(messages)) => Ok(messages.clone()),
        Some(_) => Err(Error::BadRequest(
            "llm.prompt must be a JSON string or an array of messages".into(),
        )),
        None => Ok(vec![]),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn provider_attribute_wins() {
        let merged = attrs(&[("llm.provider", json!("anthropic"))]);
        assert_eq!(
            resolve_provider(&merged, "gpt-4o").unwrap(),
            ProviderKind::Anthropic
        );
    }

    #[test]
    fn model_prefix_fallback() {
        let merged = Map::new();
        assert_eq!(
            resolve_provider(&merged, "gemini-2.0-flash").unwrap(),
            ProviderKind::Google
        );
    }

    #[test]
    fn unsupported_provider_rejected() {
        let merged = attrs(&[("llm.provider", json!("cohere"))]);
        let err = resolve_provider(&merged, "command-r").unwrap_err();
        assert!(err.to_string().contains("Unsupported provider"));
    }

    #[test]
    fn prompt_accepts_string_and_array() {
        let encoded = attrs(&[(
            "llm.prompt",
            json!("[{\"role\":\"user\",\"content\":\"hi\"}]"),
        )]);
        let messages = prompt_messages(&encoded).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");

        let inline = attrs(&[("llm.prompt", json!([{"role": "user", "content": "hi"}]))]);
        assert_eq!(prompt_messages(&inline).unwrap().len(), 1);

        let missing = Map::new();
        assert!(prompt_messages(&missing).unwrap().is_empty());

        let garbage = attrs(&[("llm.prompt", json!("{not json"))]);
        assert!(prompt_messages(&garbage).is_err());
    }
}
