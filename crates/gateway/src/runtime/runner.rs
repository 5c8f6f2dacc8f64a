//! Agent orchestrator: drives a scenario's LLM tool-calling loop as a
//! detached background task, emitting paired in-flight/complete spans
//! through intake so live subscribers watch the run unfold.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use bn_domain::attr;
use bn_domain::error::{Error, Result};
use bn_domain::now_epoch;
use bn_domain::span::{SpanRecord, SpanStatus, SpanType};
use bn_providers::{estimate_cost, ChatRequest, LlmClient, ProviderKind, ToolCompletion};

use crate::intake::Intake;
use crate::runtime::scenarios::{self, Scenario};

const TEMPERATURE: f64 = 0.7;

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioStatus {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub provider: &'static str,
    pub model: &'static str,
    pub api_key_configured: bool,
}

pub fn list_scenarios(llm: &LlmClient) -> Vec<ScenarioStatus> {
    scenarios::SCENARIOS
        .iter()
        .map(|s| ScenarioStatus {
            key: s.key,
            name: s.name,
            description: s.description,
            provider: s.provider.as_str(),
            model: s.model,
            api_key_configured: llm.has_key(s.provider),
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Launch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Start a scenario run. The root `agent_step` span is committed and
/// broadcast before this returns; the loop itself runs as a detached
/// task holding its own handles.
pub async fn start_scenario(
    intake: Arc<Intake>,
    llm: Arc<LlmClient>,
    key: &str,
) -> Result<String> {
    let scenario = scenarios::find(key)
        .ok_or_else(|| Error::BadRequest(format!("Unknown scenario: {key}")))?;
    if !llm.has_key(scenario.provider) {
        return Err(Error::BadRequest(format!(
            "No API key configured for {}. Add one in Settings.",
            scenario.provider.as_str()
        )));
    }

    let trace_id = Uuid::new_v4().to_string();
    let root_span_id = Uuid::new_v4().to_string();
    let started = now_epoch();

    // Root span goes in first so the UI can navigate to the trace.
    let root = SpanRecord {
        span_id: root_span_id.clone(),
        trace_id: trace_id.clone(),
        parent_span_id: None,
        span_type: SpanType::AgentStep,
        name: scenario.name.to_string(),
        status: SpanStatus::Unset,
        error_message: None,
        start_time: started,
        end_time: None,
        attributes: root_attributes(scenario),
        sdk_language: None,
    };
    intake.ingest_one(&root).await?;

    let task_trace_id = trace_id.clone();
    tokio::spawn(async move {
        run_agent_task(intake, llm, scenario, task_trace_id, root_span_id, started).await;
    });

    Ok(trace_id)
}

fn root_attributes(scenario: &Scenario) -> Map<String, Value> {
    let mut attributes = Map::new();
    attributes.insert("demo".into(), json!(true));
    attributes.insert("demo.scenario".into(), json!(scenario.key));
    attributes
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Background task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run the loop to completion, then close the root span as ok/error.
/// Never panics out of the task; every failure lands on the root span.
async fn run_agent_task(
    intake: Arc<Intake>,
    llm: Arc<LlmClient>,
    scenario: &'static Scenario,
    trace_id: String,
    root_span_id: String,
    started: f64,
) {
    let result = drive_loop(&intake, &llm, scenario, &trace_id, &root_span_id).await;

    let (status, error_message) = match result {
        Ok(()) => (SpanStatus::Ok, None),
        Err(e) => {
            tracing::error!(scenario = scenario.key, error = %e, "agent run failed");
            (SpanStatus::Error, Some(truncate(&e.to_string(), 200)))
        }
    };

    let root_close = SpanRecord {
        span_id: root_span_id,
        trace_id,
        parent_span_id: None,
        span_type: SpanType::AgentStep,
        name: scenario.name.to_string(),
        status,
        error_message,
        start_time: started,
        end_time: Some(now_epoch()),
        attributes: root_attributes(scenario),
        sdk_language: None,
    };
    if let Err(e) = intake.ingest_one(&root_close).await {
        tracing::error!(scenario = scenario.key, error = %e, "failed to close root span");
    }
}

async fn drive_loop(
    intake: &Intake,
    llm: &LlmClient,
    scenario: &'static Scenario,
    trace_id: &str,
    root_span_id: &str,
) -> Result<()> {
    let provider = llm.provider(scenario.provider)?;

    let mut messages: Vec<Value> = vec![
        json!({"role": "system", "content": scenario.system_prompt}),
        json!({"role": "user", "content": scenario.user_message}),
    ];

    for step in 0..scenario.max_steps {
        let llm_span_id = Uuid::new_v4().to_string();
        let llm_start = now_epoch();

        // Phase one: the call is visible as in-flight before the
        // provider round-trip begins.
        let in_flight = SpanRecord {
            span_id: llm_span_id.clone(),
            trace_id: trace_id.to_string(),
            parent_span_id: Some(root_span_id.to_string()),
            span_type: SpanType::LlmCall,
            name: scenario.model.to_string(),
            status: SpanStatus::Unset,
            error_message: None,
            start_time: llm_start,
            end_time: None,
            attributes: llm_attributes(scenario, &messages, None)?,
            sdk_language: None,
        };
        intake.ingest_one(&in_flight).await?;

        let request = ChatRequest {
            model: scenario.model.to_string(),
            messages: messages.clone(),
            temperature: Some(TEMPERATURE),
            max_tokens: None,
            tools: scenario.tools(),
        };

        let response = match provider.complete_with_tools(&request).await {
            Ok(response) => response,
            Err(e) => {
                // Phase two, error shape: same span id, final state.
                let failed = SpanRecord {
                    status: SpanStatus::Error,
                    error_message: Some(truncate(&e.to_string(), 200)),
                    end_time: Some(now_epoch()),
                    ..in_flight
                };
                intake.ingest_one(&failed).await?;
                return Err(e);
            }
        };

        let llm_end = now_epoch();
        tracing::debug!(
            scenario = scenario.key,
            step,
            tool_calls = response.tool_calls.len(),
            "agent step completed"
        );

        // Phase two: rewrite the same span with the full result.
        let completed = SpanRecord {
            status: SpanStatus::Ok,
            end_time: Some(llm_end),
            attributes: llm_attributes(scenario, &messages, Some(&response))?,
            ..in_flight
        };
        intake.ingest_one(&completed).await?;

        if response.tool_calls.is_empty() {
            break;
        }

        match scenario.provider {
            ProviderKind::OpenAi => {
                run_openai_tools(intake, trace_id, root_span_id, &response, &mut messages)
                    .await?;
            }
            ProviderKind::Anthropic => {
                run_anthropic_tools(intake, trace_id, root_span_id, &response, &mut messages)
                    .await?;
            }
            ProviderKind::Google => {
                return Err(Error::Provider {
                    provider: "google".into(),
                    message: "tool-calling scenarios are not supported for Gemini".into(),
                });
            }
        }
    }

    Ok(())
}

/// Attributes for an LLM span: the in-flight subset, or the full set
/// once a response is available.
fn llm_attributes(
    scenario: &Scenario,
    messages: &[Value],
    response: Option<&ToolCompletion>,
) -> Result<Map<String, Value>> {
    let mut attributes = Map::new();
    attributes.insert(attr::LLM_PROVIDER.into(), json!(scenario.provider.as_str()));
    attributes.insert(attr::LLM_MODEL.into(), json!(scenario.model));
    attributes.insert(
        attr::LLM_PROMPT.into(),
        Value::String(serde_json::to_string(messages)?),
    );
    attributes.insert(attr::LLM_TEMPERATURE.into(), json!(TEMPERATURE));

    if let Some(response) = response {
        let total = response.input_tokens + response.output_tokens;
        let cost = estimate_cost(scenario.model, response.input_tokens, response.output_tokens);
        attributes.insert(attr::LLM_COMPLETION.into(), json!(response.completion));
        attributes.insert(attr::LLM_TOKENS_INPUT.into(), json!(response.input_tokens));
        attributes.insert(attr::LLM_TOKENS_OUTPUT.into(), json!(response.output_tokens));
        attributes.insert(attr::LLM_TOKENS_TOTAL.into(), json!(total));
        attributes.insert(attr::LLM_COST_USD.into(), json!(cost));
        attributes.insert(attr::LLM_FINISH_REASON.into(), json!(response.finish_reason));
        if !response.tool_calls.is_empty() {
            attributes.insert(
                attr::LLM_TOOL_CALLS.into(),
                Value::String(serde_json::to_string(&response.tool_calls)?),
            );
        }
    }

    Ok(attributes)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-provider tool phases
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// OpenAI: assistant message carrying `tool_calls`, then one
/// `role:"tool"` message per call.
async fn run_openai_tools(
    intake: &Intake,
    trace_id: &str,
    root_span_id: &str,
    response: &ToolCompletion,
    messages: &mut Vec<Value>,
) -> Result<()> {
    let content = if response.completion.is_empty() {
        Value::Null
    } else {
        json!(response.completion)
    };
    messages.push(json!({
        "role": "assistant",
        "content": content,
        "tool_calls": response.tool_calls,
    }));

    for call in &response.tool_calls {
        let tool_name = call
            .pointer("/function/name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let tool_input = call
            .pointer("/function/arguments")
            .and_then(Value::as_str)
            .unwrap_or("{}")
            .to_string();
        let call_id = call.get("id").and_then(Value::as_str).unwrap_or("");

        let tool_output = scenarios::simulate_tool(&tool_name, &tool_input);
        emit_tool_span(intake, trace_id, root_span_id, &tool_name, &tool_input, &tool_output)
            .await?;

        messages.push(json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": tool_output,
        }));
    }
    Ok(())
}

/// Anthropic: the raw assistant content blocks, then one user message
/// holding `tool_result` blocks.
async fn run_anthropic_tools(
    intake: &Intake,
    trace_id: &str,
    root_span_id: &str,
    response: &ToolCompletion,
    messages: &mut Vec<Value>,
) -> Result<()> {
    messages.push(json!({
        "role": "assistant",
        "content": response.raw_message.get("content").cloned().unwrap_or(json!([])),
    }));

    let mut result_blocks: Vec<Value> = Vec::new();
    for call in &response.tool_calls {
        let tool_name = call
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let tool_input =
            serde_json::to_string(call.get("input").unwrap_or(&json!({})))?;
        let call_id = call.get("id").and_then(Value::as_str).unwrap_or("");

        let tool_output = scenarios::simulate_tool(&tool_name, &tool_input);
        emit_tool_span(intake, trace_id, root_span_id, &tool_name, &tool_input, &tool_output)
            .await?;

        result_blocks.push(json!({
            "type": "tool_result",
            "tool_use_id": call_id,
            "content": tool_output,
        }));
    }

    messages.push(json!({"role": "user", "content": result_blocks}));
    Ok(())
}

/// Emit a completed `tool_use` child span for one simulated call.
async fn emit_tool_span(
    intake: &Intake,
    trace_id: &str,
    root_span_id: &str,
    tool_name: &str,
    tool_input: &str,
    tool_output: &str,
) -> Result<()> {
    let now = now_epoch();
    let mut attributes = Map::new();
    attributes.insert(attr::TOOL_NAME.into(), json!(tool_name));
    attributes.insert(attr::TOOL_INPUT.into(), json!(tool_input));
    attributes.insert(attr::TOOL_OUTPUT.into(), json!(tool_output));

    let span = SpanRecord {
        span_id: Uuid::new_v4().to_string(),
        trace_id: trace_id.to_string(),
        parent_span_id: Some(root_span_id.to_string()),
        span_type: SpanType::ToolUse,
        name: tool_name.to_string(),
        status: SpanStatus::Ok,
        error_message: None,
        start_time: now,
        end_time: Some(now_epoch()),
        attributes,
        sdk_language: None,
    };
    intake.ingest_one(&span).await?;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::LiveBus;
    use bn_providers::ApiKeyStore;
    use bn_store::TraceStore;

    async fn harness() -> (Arc<Intake>, Arc<LlmClient>, Arc<ApiKeyStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            TraceStore::open(&dir.path().join("traces.db"))
                .await
                .unwrap(),
        );
        let bus = Arc::new(LiveBus::new());
        let keys = Arc::new(ApiKeyStore::new(dir.path().join("config.json")));
        let llm = Arc::new(LlmClient::new(keys.clone()));
        (Arc::new(Intake::new(store, bus)), llm, keys, dir)
    }

    #[tokio::test]
    async fn unknown_scenario_is_a_bad_request() {
        let (intake, llm, _keys, _dir) = harness().await;
        let err = start_scenario(intake, llm, "time_traveler")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown scenario"));
    }

    #[tokio::test]
    async fn missing_api_key_blocks_launch() {
        let (intake, llm, _keys, _dir) = harness().await;
        let err = start_scenario(intake, llm, "research_assistant")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[tokio::test]
    async fn openai_tool_phase_builds_history_and_spans() {
        let (intake, _llm, _keys, _dir) = harness().await;

        // Seed the trace with a root span the tool spans can parent on.
        let root = SpanRecord {
            span_id: "root".into(),
            trace_id: "t1".into(),
            parent_span_id: None,
            span_type: SpanType::AgentStep,
            name: "run".into(),
            status: SpanStatus::Unset,
            error_message: None,
            start_time: 1.0,
            end_time: None,
            attributes: Map::new(),
            sdk_language: None,
        };
        intake.ingest_one(&root).await.unwrap();

        let response = ToolCompletion {
            completion: String::new(),
            tool_calls: vec![json!({
                "id": "call_1",
                "type": "function",
                "function": {"name": "web_search", "arguments": "{\"query\":\"rest\"}"}
            })],
            input_tokens: 10,
            output_tokens: 5,
            finish_reason: "tool_calls".into(),
            raw_message: json!({}),
        };

        let mut messages = vec![json!({"role": "user", "content": "q"})];
        run_openai_tools(&intake, "t1", "root", &response, &mut messages)
            .await
            .unwrap();

        // assistant w/ tool_calls + one tool result appended.
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"], Value::Null);
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "call_1");

        let out = intake
            .ingest_one(&root) // re-read trace state via an upsert
            .await
            .unwrap();
        assert_eq!(out.trace.span_count, 2);
    }

    #[tokio::test]
    async fn anthropic_tool_phase_appends_content_blocks() {
        let (intake, _llm, _keys, _dir) = harness().await;
        let root = SpanRecord {
            span_id: "root".into(),
            trace_id: "t1".into(),
            parent_span_id: None,
            span_type: SpanType::AgentStep,
            name: "run".into(),
            status: SpanStatus::Unset,
            error_message: None,
            start_time: 1.0,
            end_time: None,
            attributes: Map::new(),
            sdk_language: None,
        };
        intake.ingest_one(&root).await.unwrap();

        let raw_blocks = json!([
            {"type": "text", "text": "checking"},
            {"type": "tool_use", "id": "tu_1", "name": "run_linter",
             "input": {"code": "x"}}
        ]);
        let response = ToolCompletion {
            completion: "checking".into(),
            tool_calls: vec![json!({"id": "tu_1", "name": "run_linter",
                                    "input": {"code": "x"}})],
            input_tokens: 10,
            output_tokens: 5,
            finish_reason: "tool_calls".into(),
            raw_message: json!({"content": raw_blocks}),
        };

        let mut messages = vec![json!({"role": "user", "content": "review"})];
        run_anthropic_tools(&intake, "t1", "root", &response, &mut messages)
            .await
            .unwrap();

        assert_eq!(messages.len(), 3);
        // Assistant turn carries the raw content blocks verbatim.
        assert_eq!(messages[1]["content"][1]["type"], "tool_use");
        // Tool results arrive as a user message with tool_result blocks.
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["type"], "tool_result");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "tu_1");
    }

    #[test]
    fn llm_attributes_two_phase_shapes() {
        let scenario = scenarios::find("research_assistant").unwrap();
        let messages = vec![json!({"role": "user", "content": "q"})];

        let in_flight = llm_attributes(scenario, &messages, None).unwrap();
        assert!(in_flight.contains_key(attr::LLM_PROMPT));
        assert!(!in_flight.contains_key(attr::LLM_COMPLETION));

        let response = ToolCompletion {
            completion: "answer".into(),
            tool_calls: vec![],
            input_tokens: 100,
            output_tokens: 20,
            finish_reason: "stop".into(),
            raw_message: json!({}),
        };
        let full = llm_attributes(scenario, &messages, Some(&response)).unwrap();
        assert_eq!(full[attr::LLM_TOKENS_TOTAL], 120);
        assert_eq!(full[attr::LLM_COMPLETION], "answer");
        assert!(full[attr::LLM_COST_USD].as_f64().unwrap() > 0.0);
        assert!(!full.contains_key(attr::LLM_TOOL_CALLS));
    }

    #[test]
    fn truncate_bounds_error_messages() {
        let long = "e".repeat(500);
        assert_eq!(truncate(&long, 200).len(), 200);
        assert_eq!(truncate("short", 200), "short");
    }
}
