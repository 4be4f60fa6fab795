//! Shared helpers for integration tests: an in-process provider that
//! answers by prompt content, and fast adapter/engine builders.

#![allow(dead_code)]

use futures::future::BoxFuture;
use slidesmith::config::WorkflowSettings;
use slidesmith::deck::TemplateRegistry;
use slidesmith::llm::{
    Completion, LLMError, LLMProvider, ModelRequest, RateLimitConfig, RetryPolicy, TokenUsage,
};
use slidesmith::workflow::WorkflowEngine;
use slidesmith::ProviderAdapter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(LLMError),
    Delay(Duration, String),
    /// The n-th call to the provider gets the n-th text; the last one repeats.
    Sequence(Vec<String>),
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

/// Replies with the first route whose needle occurs in the prompt.
pub struct ScriptedProvider {
    routes: Vec<(String, Reply)>,
    fallback: Reply,
    images: bool,
    calls: AtomicUsize,
    completed: AtomicUsize,
}

impl ScriptedProvider {
    pub fn builder() -> ScriptedProviderBuilder {
        ScriptedProviderBuilder {
            routes: Vec::new(),
            fallback: Reply::Fail(LLMError::InvalidRequest("no scripted reply".into())),
            images: false,
        }
    }

    /// Same reply for every prompt.
    pub fn always(reply: Reply) -> Arc<Self> {
        Self::builder().otherwise(reply).build()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

pub struct ScriptedProviderBuilder {
    routes: Vec<(String, Reply)>,
    fallback: Reply,
    images: bool,
}

impl ScriptedProviderBuilder {
    pub fn on(mut self, needle: &str, reply: Reply) -> Self {
        self.routes.push((needle.to_string(), reply));
        self
    }

    pub fn otherwise(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn images(mut self) -> Self {
        self.images = true;
        self
    }

    pub fn build(self) -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider {
            routes: self.routes,
            fallback: self.fallback,
            images: self.images,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        })
    }
}

impl LLMProvider for ScriptedProvider {
    fn execute_request(&self, request: ModelRequest) -> BoxFuture<'_, Result<Completion, LLMError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .routes
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.fallback.clone());

        Box::pin(async move {
            let result = match reply {
                Reply::Text(text) => Ok(text),
                Reply::Fail(error) => Err(error),
                Reply::Delay(delay, text) => {
                    tokio::time::sleep(delay).await;
                    Ok(text)
                }
                Reply::Sequence(texts) => texts
                    .get(call.min(texts.len().saturating_sub(1)))
                    .cloned()
                    .ok_or_else(|| LLMError::InvalidRequest("empty sequence".into())),
            };
            self.completed.fetch_add(1, Ordering::SeqCst);
            result.map(|text| Completion {
                text,
                model_used: "scripted-model".to_string(),
                token_usage: TokenUsage::default(),
            })
        })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    fn supports_images(&self) -> bool {
        self.images
    }
}

/// Retries without real backoff and no pacing between calls.
pub fn fast_adapter() -> ProviderAdapter {
    ProviderAdapter::new(
        RetryPolicy {
            max_attempts: 2,
            initial_backoff_ms: 1,
            backoff_multiplier: 2.0,
            max_backoff_ms: 2,
            jitter: false,
        },
        RateLimitConfig {
            min_interval_ms: 0,
            max_requests_per_minute: 0,
        },
    )
}

pub fn engine(adapter: ProviderAdapter) -> WorkflowEngine {
    engine_with(adapter, WorkflowSettings::default())
}

pub fn engine_with(adapter: ProviderAdapter, settings: WorkflowSettings) -> WorkflowEngine {
    WorkflowEngine::new(Arc::new(adapter), TemplateRegistry::builtin(), settings)
}

pub const BRAINSTORM_NEEDLE: &str = "Brainstorm the key points";
pub const SECTION_NEEDLE: &str = "Write the slide content";
