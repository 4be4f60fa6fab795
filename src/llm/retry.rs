use crate::llm::types::LLMError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Exponential backoff settings applied to transient backend failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
    /// Randomize each delay by ±10%.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 30_000,
            jitter: true,
        }
    }
}

/// Final result of a retried operation, with the number of attempts spent.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, LLMError>,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, given that `attempt` (1-based) just failed.
    pub fn backoff_delay(&self, attempt: u32, error: &LLMError) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let base = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        let mut delay = Duration::from_millis(base as u64);

        if self.jitter {
            let jitter = (rand::random::<f64>() - 0.5) * 0.2;
            delay = Duration::from_millis(((delay.as_millis() as f64) * (1.0 + jitter)) as u64);
        }
        delay = delay.min(Duration::from_millis(self.max_backoff_ms));

        // A server-provided retry-after wins if it asks for longer, even past the cap.
        if let LLMError::RateLimit {
            retry_after: Some(after),
            ..
        } = error
        {
            delay = delay.max(*after);
        }
        delay
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LLMError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(error) => {
                    if !error.is_transient() || attempt >= max_attempts {
                        if error.is_transient() {
                            warn!("{}: giving up after {} attempts: {}", label, attempt, error);
                        } else {
                            debug!("{}: permanent failure: {}", label, error);
                        }
                        return RetryOutcome {
                            result: Err(error),
                            attempts: attempt,
                        };
                    }

                    let delay = self.backoff_delay(attempt, &error);
                    warn!(
                        "{}: attempt {} failed ({}), retrying in {:?}",
                        label, attempt, error, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
