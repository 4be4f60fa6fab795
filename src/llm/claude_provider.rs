//! Anthropic Messages API backend
//!
//! Serves [`Provider::ClaudeV1`](crate::llm::Provider::ClaudeV1) and
//! [`Provider::Claude37`](crate::llm::Provider::Claude37). The request is a
//! single user turn with an optional system prompt:
//!
//! ```json
//! {
//!   "model": "claude-3-7-sonnet-20250219",
//!   "max_tokens": 800,
//!   "temperature": 0.7,
//!   "system": "You are a concise thought partner...",
//!   "messages": [{ "role": "user", "content": "Topic: ..." }]
//! }
//! ```
//!
//! Text blocks of the reply are concatenated into the completion text.

use crate::llm::provider::{LLMProvider, ProviderConfig, endpoint, retry_after};
use crate::llm::types::{Completion, LLMError, ModelRequest, RequestKind, TokenUsage};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    url: url::Url,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

impl ClaudeProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        config: &ProviderConfig,
    ) -> Result<Self, LLMError> {
        let base = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self {
            client,
            api_key,
            url: endpoint(base, "messages")?,
            model: config.model.clone(),
            timeout: config.timeout(),
        })
    }

    fn build_body<'a>(&'a self, request: &'a ModelRequest) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system_prompt.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        }
    }
}

pub(crate) fn parse_messages_response(body: &str) -> Result<Completion, LLMError> {
    let response: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| LLMError::MalformedResponse(format!("Anthropic response: {}", e)))?;

    let text = response
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return Err(LLMError::MalformedResponse(
            "Anthropic response contained no text".to_string(),
        ));
    }

    let token_usage = response
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        })
        .unwrap_or_default();

    Ok(Completion {
        text,
        model_used: response.model,
        token_usage,
    })
}

impl LLMProvider for ClaudeProvider {
    fn execute_request(&self, request: ModelRequest) -> BoxFuture<'_, Result<Completion, LLMError>> {
        Box::pin(async move {
            if matches!(request.kind, RequestKind::Image { .. }) {
                return Err(LLMError::InvalidRequest(
                    "Anthropic models cannot generate images".to_string(),
                ));
            }

            debug!(model = %self.model, request_id = %request.id, "Sending Anthropic request");
            let response = self
                .client
                .post(self.url.clone())
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .timeout(self.timeout)
                .json(&self.build_body(&request))
                .send()
                .await?;

            let status = response.status();
            let retry = retry_after(response.headers());
            let body = response.text().await?;

            if !status.is_success() {
                return Err(LLMError::from_http_status(status.as_u16(), &body, retry));
            }

            parse_messages_response(&body)
        })
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}
