//! Model → provider resolution and the [`LlmClient`] facade handed to
//! the rest of the service.

use std::sync::Arc;
use std::time::Duration;

use bn_domain::error::{Error, Result};

use crate::anthropic::AnthropicProvider;
use crate::google::GoogleProvider;
use crate::keys::ApiKeyStore;
use crate::openai::OpenAiProvider;
use crate::traits::LlmProvider;

/// Timeout for every upstream LLM HTTP call.
const LLM_TIMEOUT: Duration = Duration::from_secs(60);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Google,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            "google" => Some(Self::Google),
            _ => None,
        }
    }
}

/// Known models with their providers. Prefix fallback below handles
/// dated variants and new releases.
const MODEL_PROVIDER: &[(&str, ProviderKind)] = &[
    // OpenAI
    ("gpt-4.1", ProviderKind::OpenAi),
    ("gpt-4.1-mini", ProviderKind::OpenAi),
    ("gpt-4.1-nano", ProviderKind::OpenAi),
    ("gpt-4o", ProviderKind::OpenAi),
    ("gpt-4o-mini", ProviderKind::OpenAi),
    ("o3", ProviderKind::OpenAi),
    ("o3-mini", ProviderKind::OpenAi),
    ("o4-mini", ProviderKind::OpenAi),
    ("o1", ProviderKind::OpenAi),
    ("o1-mini", ProviderKind::OpenAi),
    ("gpt-4-turbo", ProviderKind::OpenAi),
    ("gpt-4", ProviderKind::OpenAi),
    ("gpt-3.5-turbo", ProviderKind::OpenAi),
    // Anthropic
    ("claude-opus-4-6", ProviderKind::Anthropic),
    ("claude-sonnet-4-6", ProviderKind::Anthropic),
    ("claude-haiku-4-5-20251001", ProviderKind::Anthropic),
    ("claude-sonnet-4-5-20250929", ProviderKind::Anthropic),
    ("claude-sonnet-4-20250514", ProviderKind::Anthropic),
    ("claude-3-5-sonnet-20241022", ProviderKind::Anthropic),
    ("claude-3-5-haiku-20241022", ProviderKind::Anthropic),
    ("claude-3-opus-20240229", ProviderKind::Anthropic),
    ("claude-3-haiku-20240307", ProviderKind::Anthropic),
    // Google Gemini
    ("gemini-2.5-pro", ProviderKind::Google),
    ("gemini-2.5-flash", ProviderKind::Google),
    ("gemini-2.0-flash-lite", ProviderKind::Google),
    ("gemini-2.0-flash", ProviderKind::Google),
    ("gemini-1.5-pro", ProviderKind::Google),
    ("gemini-1.5-flash", ProviderKind::Google),
];

/// Resolve the provider for a model name: exact table hit, then the
/// prefix families.
pub fn provider_for_model(model: &str) -> Result<ProviderKind> {
    if let Some(&(_, kind)) = MODEL_PROVIDER.iter().find(|(m, _)| *m == model) {
        return Ok(kind);
    }
    if model.starts_with("gpt")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
    {
        return Ok(ProviderKind::OpenAi);
    }
    if model.starts_with("claude") {
        return Ok(ProviderKind::Anthropic);
    }
    if model.starts_with("gemini") {
        return Ok(ProviderKind::Google);
    }
    Err(Error::BadRequest(format!("Unknown model: {model}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client facade
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Uniform entry point over the three provider adapters. Keys are read
/// from the [`ApiKeyStore`] at call time so settings changes apply
/// without a restart.
pub struct LlmClient {
    http: reqwest::Client,
    keys: Arc<ApiKeyStore>,
}

impl LlmClient {
    pub fn new(keys: Arc<ApiKeyStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(LLM_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http, keys }
    }

    /// Whether a key is configured for the given provider.
    pub fn has_key(&self, kind: ProviderKind) -> bool {
        self.keys
            .get(kind.as_str())
            .is_some_and(|k| !k.is_empty())
    }

    /// Build the adapter for a provider, failing when no API key is
    /// configured for it.
    pub fn provider(&self, kind: ProviderKind) -> Result<Box<dyn LlmProvider>> {
        let api_key = self
            .keys
            .get(kind.as_str())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::BadRequest(format!(
                    "No API key configured for {}. Add one in Settings.",
                    kind.as_str()
                ))
            })?;

        Ok(match kind {
            ProviderKind::OpenAi => {
                Box::new(OpenAiProvider::new(self.http.clone(), api_key))
            }
            ProviderKind::Anthropic => {
                Box::new(AnthropicProvider::new(self.http.clone(), api_key))
            }
            ProviderKind::Google => {
                Box::new(GoogleProvider::new(self.http.clone(), api_key))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_table_resolution() {
        assert_eq!(
            provider_for_model("gpt-4o-mini").unwrap(),
            ProviderKind::OpenAi
        );
        assert_eq!(
            provider_for_model("claude-3-haiku-20240307").unwrap(),
            ProviderKind::Anthropic
        );
        assert_eq!(
            provider_for_model("gemini-1.5-flash").unwrap(),
            ProviderKind::Google
        );
    }

    #[test]
    fn prefix_fallback_for_unknown_variants() {
        assert_eq!(
            provider_for_model("gpt-5-preview").unwrap(),
            ProviderKind::OpenAi
        );
        assert_eq!(
            provider_for_model("o3-pro-2025").unwrap(),
            ProviderKind::OpenAi
        );
        assert_eq!(
            provider_for_model("claude-next").unwrap(),
            ProviderKind::Anthropic
        );
        assert_eq!(
            provider_for_model("gemini-3.0-ultra").unwrap(),
            ProviderKind::Google
        );
    }

    #[test]
    fn unknown_model_is_a_bad_request() {
        let err = provider_for_model("llama-3-70b").unwrap_err();
        assert!(err.to_string().contains("Unknown model"));
    }

    #[test]
    fn missing_key_blocks_provider_construction() {
        let dir = tempfile::tempdir().unwrap();
        let keys = Arc::new(ApiKeyStore::new(dir.path().join("config.json")));
        let client = LlmClient::new(keys.clone());

        assert!(!client.has_key(ProviderKind::OpenAi));
        let err = client.provider(ProviderKind::OpenAi).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));

        keys.set("openai", "sk-test").unwrap();
        assert!(client.has_key(ProviderKind::OpenAi));
        assert!(client.provider(ProviderKind::OpenAi).is_ok());
    }

    #[test]
    fn provider_kind_strings() {
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Google,
        ] {
            assert_eq!(ProviderKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ProviderKind::parse("azure"), None);
    }
}
