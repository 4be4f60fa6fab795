//! Scripted in-process backend for unit tests.

use crate::llm::provider::LLMProvider;
use crate::llm::types::{Completion, LLMError, ModelRequest, TokenUsage};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(LLMError),
    /// Reply after sleeping.
    Delay(Duration, String),
}

/// Plays back `steps` in order; the last step repeats once the script runs out.
pub struct ScriptedBackend {
    steps: Vec<Step>,
    calls: AtomicUsize,
    completed: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    images: bool,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            images: false,
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(vec![Step::Reply(text.to_string())])
    }

    pub fn with_images(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            images: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that ran to completion (not dropped mid-flight).
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LLMProvider for ScriptedBackend {
    fn execute_request(&self, request: ModelRequest) -> BoxFuture<'_, Result<Completion, LLMError>> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let step = self
            .steps
            .get(index)
            .or_else(|| self.steps.last())
            .cloned()
            .unwrap_or_else(|| Step::Fail(LLMError::InvalidRequest("empty script".into())));

        Box::pin(async move {
            let result = match step {
                Step::Reply(text) => Ok(text),
                Step::Fail(error) => Err(error),
                Step::Delay(delay, text) => {
                    tokio::time::sleep(delay).await;
                    Ok(text)
                }
            };
            self.completed.fetch_add(1, Ordering::SeqCst);
            result.map(|text| Completion {
                text,
                model_used: "scripted".to_string(),
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
