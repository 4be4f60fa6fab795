//! Append-only record of every adapter invocation.
//!
//! Each provider gets its own JSONL file under the workspace logs directory:
//!
//! ```text
//! .slidesmith/logs/
//!   claude-37-interactions.jsonl
//!   gpt4-interactions.jsonl
//! ```
//!
//! One line is written per call, success or failure, with truncated prompt
//! and response previews. Write failures are reported through `tracing` and
//! never reach the caller.

use crate::llm::types::{ModelRequest, ModelResponse, Provider, ResponseStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

/// Configuration for interaction logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionLogConfig {
    pub enabled: bool,
    /// Maximum characters kept from prompts and responses
    pub max_preview_chars: usize,
}

impl Default for InteractionLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_preview_chars: 500,
        }
    }
}

/// One logged invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub provider: Provider,
    pub model: Option<String>,
    pub status: ResponseStatus,
    pub attempts: u32,
    pub latency_ms: u64,
    pub prompt_preview: String,
    pub response_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InteractionLogger {
    config: InteractionLogConfig,
    logs_dir: PathBuf,
}

impl InteractionLogger {
    pub async fn new(
        config: InteractionLogConfig,
        logs_dir: PathBuf,
    ) -> Result<Self, std::io::Error> {
        if config.enabled {
            fs::create_dir_all(&logs_dir).await?;
        }
        Ok(Self { config, logs_dir })
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn log_path(&self, provider: Provider) -> PathBuf {
        self.logs_dir
            .join(format!("{}-interactions.jsonl", provider.as_str()))
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn build_record(&self, request: &ModelRequest, response: &ModelResponse) -> InteractionRecord {
        InteractionRecord {
            timestamp: Utc::now(),
            request_id: request.id,
            provider: request.provider,
            model: response.model_used.clone(),
            status: response.status,
            attempts: response.attempts,
            latency_ms: response.latency_ms,
            prompt_preview: self.preview(&request.prompt),
            response_preview: self.preview(&response.raw_text),
            cause: response.cause.clone(),
        }
    }

    /// Append a record for this invocation. Never fails the caller.
    pub async fn record(&self, request: &ModelRequest, response: &ModelResponse) {
        if !self.config.enabled {
            return;
        }

        let record = self.build_record(request, response);
        if let Err(e) = self.append(&record).await {
            warn!(
                provider = %request.provider,
                "Failed to write interaction log: {}",
                e
            );
        }
    }

    async fn append(&self, record: &InteractionRecord) -> Result<(), std::io::Error> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(record.provider))
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    fn preview(&self, text: &str) -> String {
        let max = self.config.max_preview_chars;
        if text.chars().count() <= max {
            text.replace('\n', " ")
        } else {
            let head: String = text.chars().take(max).collect();
            format!("{}...", head.replace('\n', " "))
        }
    }
}
