use crate::llm::types::{Completion, LLMError, ModelRequest, Provider, ProviderFamily};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A model backend that speaks one provider's native wire format.
///
/// Backends only translate and transport; timeouts, retries and rate limiting
/// are applied uniformly by [`crate::llm::ProviderAdapter`].
pub trait LLMProvider: Send + Sync {
    /// Execute a single request against the backend.
    fn execute_request(&self, request: ModelRequest) -> BoxFuture<'_, Result<Completion, LLMError>>;

    /// Get provider name/identifier
    fn provider_name(&self) -> &'static str;

    /// Whether the backend can serve [`crate::llm::RequestKind::Image`] requests.
    fn supports_images(&self) -> bool {
        false
    }

    /// Estimate token count for text
    fn estimate_tokens(&self, text: &str) -> u64 {
        // ~4 characters per token
        (text.len() as f64 / 4.0).ceil() as u64
    }
}

/// Per-provider connection and sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub model: String,
    /// Environment variable the API key is read from.
    pub api_key_env: String,
    /// Resolved key; never written to config files.
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ProviderConfig {
    pub fn for_provider(provider: Provider) -> Self {
        let timeout_secs = match provider.family() {
            ProviderFamily::Anthropic => 25,
            ProviderFamily::OpenAI => 30,
        };
        Self {
            model: provider.default_model().to_string(),
            api_key_env: provider.default_api_key_env().to_string(),
            api_key: None,
            base_url: None,
            timeout_secs,
            max_tokens: 800,
            temperature: 0.7,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Replace blank fields (from a partial config table) with `provider`'s defaults.
    pub fn fill_defaults(&mut self, provider: Provider) {
        let defaults = Self::for_provider(provider);
        if self.model.trim().is_empty() {
            self.model = defaults.model;
        }
        if self.api_key_env.trim().is_empty() {
            self.api_key_env = defaults.api_key_env;
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = defaults.timeout_secs;
        }
    }

    /// Fill `api_key` from the configured environment variable if not already set.
    pub fn resolve_api_key(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var(&self.api_key_env)
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
    }
}

/// Blank model, key variable and timeout; see [`ProviderConfig::fill_defaults`].
impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            api_key_env: String::new(),
            api_key: None,
            base_url: None,
            timeout_secs: 0,
            max_tokens: 800,
            temperature: 0.7,
        }
    }
}

/// Factory for creating LLM providers
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    pub fn create_provider(
        provider: Provider,
        config: &ProviderConfig,
        client: reqwest::Client,
    ) -> Result<Arc<dyn LLMProvider>, LLMError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            LLMError::ProviderUnavailable(format!(
                "{} is not configured (set {})",
                provider, config.api_key_env
            ))
        })?;

        match provider.family() {
            ProviderFamily::Anthropic => Ok(Arc::new(
                crate::llm::claude_provider::ClaudeProvider::new(client, api_key, config)?,
            )),
            ProviderFamily::OpenAI => Ok(Arc::new(
                crate::llm::openai_provider::OpenAIProvider::new(client, api_key, config)?,
            )),
        }
    }
}

/// Parse a `retry-after` header expressed in whole seconds.
pub(crate) fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Join `path` onto a base URL, tolerating a missing trailing slash on the base.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<url::Url, LLMError> {
    let normalized = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    url::Url::parse(&normalized)
        .and_then(|url| url.join(path))
        .map_err(|e| LLMError::InvalidRequest(format!("Invalid base URL '{}': {}", base, e)))
}
