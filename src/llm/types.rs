use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// The closed set of model providers a run can fan out to.
///
/// Adding a provider means adding a variant here plus its backend mapping in
/// [`crate::llm::provider::LLMProviderFactory`]; call sites never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "claude-v1")]
    ClaudeV1,
    #[serde(rename = "claude-37")]
    Claude37,
    #[serde(rename = "gpt4")]
    Gpt4,
}

/// Wire protocol family behind a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderFamily {
    Anthropic,
    OpenAI,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Claude37, Provider::Gpt4, Provider::ClaudeV1];

    pub fn family(&self) -> ProviderFamily {
        match self {
            Provider::ClaudeV1 | Provider::Claude37 => ProviderFamily::Anthropic,
            Provider::Gpt4 => ProviderFamily::OpenAI,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::ClaudeV1 => "claude-3-opus-20240229",
            Provider::Claude37 => "claude-3-7-sonnet-20250219",
            Provider::Gpt4 => "gpt-4-turbo",
        }
    }

    /// Environment variable holding the API key for this provider's family.
    pub fn default_api_key_env(&self) -> &'static str {
        match self.family() {
            ProviderFamily::Anthropic => "ANTHROPIC_API_KEY",
            ProviderFamily::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::ClaudeV1 => "claude-v1",
            Provider::Claude37 => "claude-37",
            Provider::Gpt4 => "gpt4",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude-v1" | "claude" | "claudev1" => Ok(Provider::ClaudeV1),
            "claude-37" | "claude-3-7" | "claude37" | "claude-sonnet" => Ok(Provider::Claude37),
            "gpt4" | "gpt-4" => Ok(Provider::Gpt4),
            other => Err(LLMError::InvalidRequest(format!(
                "Unknown provider '{}'. Expected one of: claude-v1, claude-37, gpt4",
                other
            ))),
        }
    }
}

/// What kind of output a request asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum RequestKind {
    #[default]
    Text,
    Image {
        size: String,
        quality: String,
    },
}

/// Normalized request sent to one provider. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    pub id: Uuid,
    pub provider: Provider,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub kind: RequestKind,
}

impl ModelRequest {
    pub fn text(provider: Provider, prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: 1000,
            temperature: 0.7,
            kind: RequestKind::Text,
        }
    }

    pub fn image(provider: Provider, prompt: impl Into<String>, size: &str, quality: &str) -> Self {
        Self {
            kind: RequestKind::Image {
                size: size.to_string(),
                quality: quality.to_string(),
            },
            ..Self::text(provider, prompt)
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Outcome classification of a single adapter invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Ok,
    Timeout,
    RateLimited,
    Error,
}

/// Normalized response produced by the adapter for every request, success or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub request_id: Uuid,
    pub provider: Provider,
    pub raw_text: String,
    pub latency_ms: u64,
    pub status: ResponseStatus,
    /// Underlying cause when `status` is not `Ok`.
    pub cause: Option<String>,
    pub attempts: u32,
    pub model_used: Option<String>,
}

impl ModelResponse {
    pub fn ok(request: &ModelRequest, completion: Completion, latency: Duration, attempts: u32) -> Self {
        Self {
            request_id: request.id,
            provider: request.provider,
            raw_text: completion.text,
            latency_ms: latency.as_millis() as u64,
            status: ResponseStatus::Ok,
            cause: None,
            attempts,
            model_used: Some(completion.model_used),
        }
    }

    pub fn failed(
        request: &ModelRequest,
        status: ResponseStatus,
        cause: impl Into<String>,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            request_id: request.id,
            provider: request.provider,
            raw_text: String::new(),
            latency_ms: latency.as_millis() as u64,
            status,
            cause: Some(cause.into()),
            attempts,
            model_used: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

/// What a backend hands back on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub model_used: String,
    pub token_usage: TokenUsage,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Backend errors, classified so the retry policy can tell transient from permanent.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl LLMError {
    /// Transient failures are worth another attempt after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LLMError::RateLimit { .. }
                | LLMError::Server { .. }
                | LLMError::Network(_)
                | LLMError::Timeout(_)
        )
    }

    /// Status reported to callers once retries are exhausted.
    pub fn terminal_status(&self) -> ResponseStatus {
        match self {
            LLMError::RateLimit { .. } => ResponseStatus::RateLimited,
            LLMError::Timeout(_) => ResponseStatus::Timeout,
            _ => ResponseStatus::Error,
        }
    }

    /// Maps an HTTP status plus body to the matching error class.
    pub fn from_http_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let message = body.chars().take(300).collect::<String>();
        match status {
            429 => LLMError::RateLimit {
                message,
                retry_after,
            },
            401 | 403 => LLMError::Authentication(message),
            408 => LLMError::Timeout(message),
            500..=599 => LLMError::Server { status, message },
            _ => LLMError::InvalidRequest(format!("HTTP {}: {}", status, message)),
        }
    }
}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LLMError::Timeout(err.to_string())
        } else if err.is_decode() {
            LLMError::MalformedResponse(err.to_string())
        } else {
            LLMError::Network(err.to_string())
        }
    }
}
