use crate::llm::provider::{LLMProvider, ProviderConfig, endpoint, retry_after};
use crate::llm::types::{Completion, LLMError, ModelRequest, RequestKind, TokenUsage};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const IMAGE_MODEL: &str = "dall-e-3";

/// OpenAI backend: Chat Completions for text, Images API for thumbnails.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    chat_url: url::Url,
    images_url: url::Url,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'static str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

impl OpenAIProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        config: &ProviderConfig,
    ) -> Result<Self, LLMError> {
        let base = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self {
            client,
            api_key,
            chat_url: endpoint(base, "chat/completions")?,
            images_url: endpoint(base, "images/generations")?,
            model: config.model.clone(),
            timeout: config.timeout(),
        })
    }

    fn chat_body<'a>(&'a self, request: &'a ModelRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        ChatRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages,
        }
    }

    async fn post<T: Serialize>(&self, url: &url::Url, body: &T) -> Result<String, LLMError> {
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let retry = retry_after(response.headers());
        let text = response.text().await?;

        if status.is_success() {
            Ok(text)
        } else {
            Err(LLMError::from_http_status(status.as_u16(), &text, retry))
        }
    }
}

pub(crate) fn parse_chat_response(body: &str) -> Result<Completion, LLMError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| LLMError::MalformedResponse(format!("OpenAI chat response: {}", e)))?;

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| LLMError::MalformedResponse("OpenAI response had no content".to_string()))?;

    let token_usage = response
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(Completion {
        text,
        model_used: response.model,
        token_usage,
    })
}

/// The image URL becomes the completion text.
pub(crate) fn parse_image_response(body: &str) -> Result<Completion, LLMError> {
    let response: ImageResponse = serde_json::from_str(body)
        .map_err(|e| LLMError::MalformedResponse(format!("OpenAI image response: {}", e)))?;

    let url = response
        .data
        .into_iter()
        .find_map(|image| image.url)
        .ok_or_else(|| LLMError::MalformedResponse("Image response had no URL".to_string()))?;

    Ok(Completion {
        text: url,
        model_used: IMAGE_MODEL.to_string(),
        token_usage: TokenUsage::default(),
    })
}

impl LLMProvider for OpenAIProvider {
    fn execute_request(&self, request: ModelRequest) -> BoxFuture<'_, Result<Completion, LLMError>> {
        Box::pin(async move {
            match &request.kind {
                RequestKind::Text => {
                    debug!(model = %self.model, request_id = %request.id, "Sending chat completion");
                    let body = self.post(&self.chat_url, &self.chat_body(&request)).await?;
                    parse_chat_response(&body)
                }
                RequestKind::Image { size, quality } => {
                    debug!(request_id = %request.id, size = %size, "Sending image generation");
                    let image = ImageRequest {
                        model: IMAGE_MODEL,
                        prompt: &request.prompt,
                        size,
                        quality,
                        n: 1,
                    };
                    let body = self.post(&self.images_url, &image).await?;
                    parse_image_response(&body)
                }
            }
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn supports_images(&self) -> bool {
        true
    }
}
