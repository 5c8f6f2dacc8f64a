//! Well-known span attribute keys.
//!
//! Attributes are a free-form JSON object; these keys are the ones the
//! aggregator, exporters, runner, and replay path interpret.

use serde_json::Value;

// ── LLM calls ───────────────────────────────────────────────────────
pub const LLM_PROVIDER: &str = "llm.provider";
pub const LLM_MODEL: &str = "llm.model";
pub const LLM_PROMPT: &str = "llm.prompt";
pub const LLM_COMPLETION: &str = "llm.completion";
pub const LLM_TOKENS_INPUT: &str = "llm.tokens.input";
pub const LLM_TOKENS_OUTPUT: &str = "llm.tokens.output";
pub const LLM_TOKENS_TOTAL: &str = "llm.tokens.total";
pub const LLM_COST_USD: &str = "llm.cost_usd";
pub const LLM_TEMPERATURE: &str = "llm.temperature";
pub const LLM_MAX_TOKENS: &str = "llm.max_tokens";
pub const LLM_FINISH_REASON: &str = "llm.finish_reason";
pub const LLM_TOOL_CALLS: &str = "llm.tool_calls";

// ── Tool invocations ────────────────────────────────────────────────
pub const TOOL_NAME: &str = "tool.name";
pub const TOOL_INPUT: &str = "tool.input";
pub const TOOL_OUTPUT: &str = "tool.output";

// ── Browser actions ─────────────────────────────────────────────────
pub const BROWSER_ACTION: &str = "browser.action";
pub const BROWSER_URL: &str = "browser.url";
pub const BROWSER_SELECTOR: &str = "browser.selector";
pub const BROWSER_VALUE: &str = "browser.value";
pub const BROWSER_SCREENSHOT: &str = "browser.screenshot";

// ── File operations ─────────────────────────────────────────────────
pub const FILE_OPERATION: &str = "file.operation";
pub const FILE_PATH: &str = "file.path";
pub const FILE_CONTENT: &str = "file.content";
pub const FILE_SIZE_BYTES: &str = "file.size_bytes";

// ── Shell commands ──────────────────────────────────────────────────
pub const SHELL_COMMAND: &str = "shell.command";
pub const SHELL_STDOUT: &str = "shell.stdout";
pub const SHELL_STDERR: &str = "shell.stderr";
pub const SHELL_RETURNCODE: &str = "shell.returncode";

// ── Chains ──────────────────────────────────────────────────────────
pub const CHAIN_TYPE: &str = "chain.type";
pub const CHAIN_INPUT: &str = "chain.input";
pub const CHAIN_OUTPUT: &str = "chain.output";

// ── Agent steps ─────────────────────────────────────────────────────
pub const AGENT_FRAMEWORK: &str = "agent.framework";
pub const AGENT_STEP_NAME: &str = "agent.step_name";
pub const AGENT_INPUT: &str = "agent.input";
pub const AGENT_OUTPUT: &str = "agent.output";
pub const AGENT_THOUGHT: &str = "agent.thought";

// ── Carried inside OTLP attributes rather than span fields ──────────
pub const SPAN_TYPE: &str = "span_type";
pub const ERROR_MESSAGE: &str = "error.message";

/// Read an attribute as a float. Non-numeric values count as zero for
/// aggregation purposes.
pub fn as_f64(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

/// Read an attribute as an integer, truncating floats. Non-numeric
/// values count as zero.
pub fn as_i64(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_extraction() {
        assert_eq!(as_f64(Some(&json!(0.05))), 0.05);
        assert_eq!(as_f64(Some(&json!(3))), 3.0);
        assert_eq!(as_i64(Some(&json!(1000))), 1000);
        assert_eq!(as_i64(Some(&json!(12.7))), 12);
    }

    #[test]
    fn non_numeric_counts_as_zero() {
        assert_eq!(as_f64(Some(&json!("0.05"))), 0.0);
        assert_eq!(as_f64(Some(&json!(null))), 0.0);
        assert_eq!(as_f64(None), 0.0);
        assert_eq!(as_i64(Some(&json!("1000"))), 0);
        assert_eq!(as_i64(Some(&json!([1, 2]))), 0);
    }
}
