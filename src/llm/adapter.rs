use crate::config::AppConfig;
use crate::llm::interaction_log::InteractionLogger;
use crate::llm::provider::{LLMProvider, LLMProviderFactory};
use crate::llm::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::llm::retry::RetryPolicy;
use crate::llm::types::{LLMError, ModelRequest, ModelResponse, Provider, ResponseStatus};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const NOT_CONFIGURED: &str = "provider not configured";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// When a fan-out may stop waiting for outstanding calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Wait for every request (or the stage deadline).
    #[default]
    All,
    /// Stop as soon as this many requests came back `Ok`.
    FirstSuccesses(usize),
}

/// Stage-level controls for [`ProviderAdapter::invoke_many_controlled`].
#[derive(Debug, Clone, Default)]
pub struct FanOutControl {
    /// Absolute end of the stage; several fan-outs in one stage share it.
    pub deadline: Option<Instant>,
    pub policy: JoinPolicy,
    /// Flipping this to `true` aborts the fan-out and drops in-flight calls.
    pub cancel: Option<watch::Receiver<bool>>,
}

#[derive(Debug)]
pub enum FanOut {
    /// One slot per request, in request order. A slot is `None` when the join
    /// policy was satisfied before that call returned; the call was dropped,
    /// not failed.
    Completed(Vec<Option<ModelResponse>>),
    Cancelled,
}

/// Uniform entry point over every model backend.
///
/// `invoke` never returns an error: timeouts, exhausted retries and missing
/// credentials all come back as a [`ModelResponse`] with a non-`Ok` status and
/// the cause recorded. The adapter is shared by all runs and holds no per-run
/// state.
pub struct ProviderAdapter {
    backends: HashMap<Provider, Arc<dyn LLMProvider>>,
    timeouts: HashMap<Provider, Duration>,
    unavailable: HashMap<Provider, String>,
    limiters: HashMap<Provider, RateLimiter>,
    retry: RetryPolicy,
    logger: Option<InteractionLogger>,
}

impl ProviderAdapter {
    /// An adapter with no backends; every provider reports "not configured".
    pub fn new(retry: RetryPolicy, rate_limit: RateLimitConfig) -> Self {
        let limiters = Provider::ALL
            .iter()
            .map(|provider| (*provider, RateLimiter::new(rate_limit.clone())))
            .collect();

        Self {
            backends: HashMap::new(),
            timeouts: HashMap::new(),
            unavailable: HashMap::new(),
            limiters,
            retry,
            logger: None,
        }
    }

    /// Build backends for every provider that has credentials, sharing one HTTP client.
    pub async fn from_config(config: &AppConfig, workspace: &Path) -> Result<Self, LLMError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("slidesmith/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut adapter = Self::new(config.retry.clone(), config.rate_limit.clone());

        for provider in Provider::ALL {
            let mut provider_config = config.providers.get(provider).clone();
            provider_config.resolve_api_key();

            match LLMProviderFactory::create_provider(provider, &provider_config, client.clone()) {
                Ok(backend) => {
                    debug!(%provider, model = %provider_config.model, "Backend configured");
                    adapter = adapter.with_backend(provider, backend, provider_config.timeout());
                }
                Err(e) => {
                    info!(%provider, "Backend unavailable: {}", e);
                    adapter
                        .unavailable
                        .insert(provider, format!("{}: {}", NOT_CONFIGURED, e));
                }
            }
        }

        if config.logging.enabled {
            let logs_dir = crate::env::logs_dir(workspace);
            match InteractionLogger::new(config.logging.clone(), logs_dir).await {
                Ok(logger) => adapter = adapter.with_logger(logger),
                Err(e) => warn!("Interaction log disabled: {}", e),
            }
        }

        Ok(adapter)
    }

    pub fn with_backend(
        mut self,
        provider: Provider,
        backend: Arc<dyn LLMProvider>,
        timeout: Duration,
    ) -> Self {
        self.unavailable.remove(&provider);
        self.backends.insert(provider, backend);
        self.timeouts.insert(provider, timeout);
        self
    }

    pub fn with_logger(mut self, logger: InteractionLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.backends.contains_key(&provider)
    }

    pub fn configured_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .iter()
            .copied()
            .filter(|p| self.is_configured(*p))
            .collect()
    }

    pub fn supports_images(&self, provider: Provider) -> bool {
        self.backends
            .get(&provider)
            .is_some_and(|backend| backend.supports_images())
    }

    fn timeout_for(&self, provider: Provider) -> Duration {
        self.timeouts
            .get(&provider)
            .copied()
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Send one request, applying rate limiting, the per-call timeout and retries.
    pub async fn invoke(&self, request: ModelRequest) -> ModelResponse {
        let started = Instant::now();
        let provider = request.provider;

        let response = match self.backends.get(&provider) {
            None => {
                let cause = self
                    .unavailable
                    .get(&provider)
                    .cloned()
                    .unwrap_or_else(|| NOT_CONFIGURED.to_string());
                warn!(%provider, request_id = %request.id, "{}", cause);
                ModelResponse::failed(&request, ResponseStatus::Error, cause, started.elapsed(), 0)
            }
            Some(backend) => self.invoke_backend(backend, &request, started).await,
        };

        if let Some(logger) = &self.logger {
            logger.record(&request, &response).await;
        }
        response
    }

    async fn invoke_backend(
        &self,
        backend: &Arc<dyn LLMProvider>,
        request: &ModelRequest,
        started: Instant,
    ) -> ModelResponse {
        let provider = request.provider;
        let timeout = self.timeout_for(provider);
        let limiter = self.limiters.get(&provider);
        let label = format!("{} request {}", provider, request.id);

        let outcome = self
            .retry
            .execute(&label, || {
                let backend = backend.clone();
                let request = request.clone();
                async move {
                    if let Some(limiter) = limiter {
                        limiter.acquire().await;
                    }
                    match tokio::time::timeout(timeout, backend.execute_request(request)).await {
                        Ok(result) => result,
                        Err(_) => Err(LLMError::Timeout(format!(
                            "no response within {:?}",
                            timeout
                        ))),
                    }
                }
            })
            .await;

        let latency = started.elapsed();
        match outcome.result {
            Ok(completion) => {
                debug!(
                    %provider,
                    request_id = %request.id,
                    attempts = outcome.attempts,
                    latency_ms = latency.as_millis() as u64,
                    tokens = completion.token_usage.total(),
                    "Provider call succeeded"
                );
                ModelResponse::ok(request, completion, latency, outcome.attempts)
            }
            Err(error) => {
                warn!(
                    %provider,
                    request_id = %request.id,
                    attempts = outcome.attempts,
                    "Provider call failed: {}",
                    error
                );
                ModelResponse::failed(
                    request,
                    error.terminal_status(),
                    error.to_string(),
                    latency,
                    outcome.attempts,
                )
            }
        }
    }

    /// Parallel fan-out; result `i` always belongs to request `i`.
    pub async fn invoke_many(&self, requests: Vec<ModelRequest>) -> Vec<ModelResponse> {
        join_all(requests.into_iter().map(|request| self.invoke(request))).await
    }

    /// Fan-out with a stage deadline, an early-exit policy and cancellation.
    ///
    /// Slots left unfilled when the deadline hits are reported as `Timeout`;
    /// slots skipped because the join policy was already satisfied stay
    /// `None`. Outstanding calls are dropped, which aborts them.
    pub async fn invoke_many_controlled(
        &self,
        requests: Vec<ModelRequest>,
        control: FanOutControl,
    ) -> FanOut {
        let mut cancel = control.cancel;
        if is_cancelled(&cancel) {
            return FanOut::Cancelled;
        }

        let started = Instant::now();
        let deadline = control.deadline;
        let mut slots: Vec<Option<ModelResponse>> = vec![None; requests.len()];

        let mut pending: FuturesUnordered<_> = requests
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, request)| async move { (index, self.invoke(request).await) })
            .collect();

        let mut successes = 0usize;
        let mut deadline_hit = false;

        loop {
            if pending.is_empty() {
                break;
            }
            if let JoinPolicy::FirstSuccesses(needed) = control.policy
                && successes >= needed.max(1)
            {
                break;
            }

            tokio::select! {
                biased;
                _ = wait_for_cancel(&mut cancel) => {
                    info!("Fan-out cancelled, dropping {} in-flight calls", pending.len());
                    return FanOut::Cancelled;
                }
                _ = sleep_until(deadline) => {
                    warn!("Stage deadline reached with {} calls outstanding", pending.len());
                    deadline_hit = true;
                    break;
                }
                Some((index, response)) = pending.next() => {
                    if response.is_ok() {
                        successes += 1;
                    }
                    slots[index] = Some(response);
                }
            }
        }
        if !pending.is_empty() && !deadline_hit {
            debug!(skipped = pending.len(), "Join policy satisfied, dropping remaining calls");
        }
        drop(pending);

        let elapsed = started.elapsed();
        let responses = slots
            .into_iter()
            .zip(requests.iter())
            .map(|(slot, request)| match slot {
                None if deadline_hit => Some(ModelResponse::failed(
                    request,
                    ResponseStatus::Timeout,
                    "stage timeout exceeded",
                    elapsed,
                    0,
                )),
                slot => slot,
            })
            .collect();

        FanOut::Completed(responses)
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

async fn wait_for_cancel(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        Some(rx) => {
            let signalled = rx.wait_for(|cancelled| *cancelled).await.is_ok();
            if !signalled {
                // Sender gone: nobody can cancel any more.
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::{ScriptedBackend, Step};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 1,
            backoff_multiplier: 2.0,
            max_backoff_ms: 4,
            jitter: false,
        }
    }

    fn no_pacing() -> RateLimitConfig {
        RateLimitConfig {
            min_interval_ms: 0,
            max_requests_per_minute: 0,
        }
    }

    fn adapter() -> ProviderAdapter {
        ProviderAdapter::new(fast_retry(), no_pacing())
    }

    #[tokio::test]
    async fn test_unconfigured_provider_reports_error() {
        let response = adapter()
            .invoke(ModelRequest::text(Provider::Gpt4, "hi"))
            .await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.cause.as_deref(), Some("provider not configured"));
        assert_eq!(response.attempts, 0);
    }

    #[tokio::test]
    async fn test_successful_invoke() {
        let backend = ScriptedBackend::replying("- Fast\n- Safe");
        let adapter = adapter().with_backend(Provider::Claude37, backend.clone(), Duration::from_secs(1));

        let response = adapter
            .invoke(ModelRequest::text(Provider::Claude37, "hi"))
            .await;
        assert!(response.is_ok());
        assert_eq!(response.raw_text, "- Fast\n- Safe");
        assert_eq!(response.attempts, 1);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_per_call_timeout_becomes_status() {
        let backend = ScriptedBackend::new(vec![Step::Delay(Duration::from_secs(5), "late".into())]);
        let adapter = adapter().with_backend(Provider::Gpt4, backend.clone(), Duration::from_millis(20));

        let response = adapter.invoke(ModelRequest::text(Provider::Gpt4, "hi")).await;
        assert_eq!(response.status, ResponseStatus::Timeout);
        assert_eq!(response.attempts, 3);
        assert!(response.cause.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_reported() {
        let backend = ScriptedBackend::new(vec![Step::Fail(LLMError::RateLimit {
            message: "429".into(),
            retry_after: None,
        })]);
        let adapter = adapter().with_backend(Provider::Gpt4, backend.clone(), Duration::from_secs(1));

        let response = adapter.invoke(ModelRequest::text(Provider::Gpt4, "hi")).await;
        assert_eq!(response.status, ResponseStatus::RateLimited);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let backend = ScriptedBackend::new(vec![
            Step::Fail(LLMError::Server {
                status: 502,
                message: "bad gateway".into(),
            }),
            Step::Reply("ok".into()),
        ]);
        let adapter = adapter().with_backend(Provider::ClaudeV1, backend, Duration::from_secs(1));

        let response = adapter
            .invoke(ModelRequest::text(Provider::ClaudeV1, "hi"))
            .await;
        assert!(response.is_ok());
        assert_eq!(response.attempts, 2);
    }

    #[tokio::test]
    async fn test_invoke_many_preserves_order_and_isolates_failures() {
        let slow = ScriptedBackend::new(vec![Step::Delay(Duration::from_millis(30), "slow".into())]);
        let broken = ScriptedBackend::new(vec![Step::Fail(LLMError::Authentication("nope".into()))]);
        let adapter = adapter()
            .with_backend(Provider::Claude37, slow, Duration::from_secs(1))
            .with_backend(Provider::Gpt4, broken, Duration::from_secs(1));

        let responses = adapter
            .invoke_many(vec![
                ModelRequest::text(Provider::Claude37, "a"),
                ModelRequest::text(Provider::Gpt4, "b"),
                ModelRequest::text(Provider::ClaudeV1, "c"),
            ])
            .await;

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].provider, Provider::Claude37);
        assert!(responses[0].is_ok());
        assert_eq!(responses[1].status, ResponseStatus::Error);
        assert_eq!(responses[2].cause.as_deref(), Some("provider not configured"));
    }

    #[tokio::test]
    async fn test_stage_timeout_fills_outstanding_slots() {
        let fast = ScriptedBackend::replying("fast");
        let slow = ScriptedBackend::new(vec![Step::Delay(Duration::from_secs(5), "slow".into())]);
        let adapter = adapter()
            .with_backend(Provider::Claude37, fast, Duration::from_secs(10))
            .with_backend(Provider::Gpt4, slow, Duration::from_secs(10));

        let outcome = adapter
            .invoke_many_controlled(
                vec![
                    ModelRequest::text(Provider::Claude37, "a"),
                    ModelRequest::text(Provider::Gpt4, "b"),
                ],
                FanOutControl {
                    deadline: Some(Instant::now() + Duration::from_millis(50)),
                    ..Default::default()
                },
            )
            .await;

        let FanOut::Completed(responses) = outcome else {
            panic!("fan-out should complete");
        };
        let responses: Vec<ModelResponse> = responses.into_iter().flatten().collect();
        assert_eq!(responses.len(), 2);
        assert!(responses[0].is_ok());
        assert_eq!(responses[1].status, ResponseStatus::Timeout);
        assert_eq!(responses[1].cause.as_deref(), Some("stage timeout exceeded"));
    }

    #[tokio::test]
    async fn test_first_success_policy_stops_early() {
        let fast = ScriptedBackend::replying("fast");
        let slow = ScriptedBackend::new(vec![Step::Delay(Duration::from_secs(5), "slow".into())]);
        let adapter = adapter()
            .with_backend(Provider::Claude37, slow, Duration::from_secs(10))
            .with_backend(Provider::Gpt4, fast, Duration::from_secs(10));

        let started = Instant::now();
        let outcome = adapter
            .invoke_many_controlled(
                vec![
                    ModelRequest::text(Provider::Claude37, "a"),
                    ModelRequest::text(Provider::Gpt4, "b"),
                ],
                FanOutControl {
                    policy: JoinPolicy::FirstSuccesses(1),
                    ..Default::default()
                },
            )
            .await;

        let FanOut::Completed(responses) = outcome else {
            panic!("fan-out should complete");
        };
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(responses[0].is_none(), "the slow call was skipped, not failed");
        assert!(responses[1].as_ref().is_some_and(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_cancellation_drops_in_flight_calls() {
        let slow = ScriptedBackend::new(vec![Step::Delay(Duration::from_secs(5), "slow".into())]);
        let adapter = adapter().with_backend(Provider::Gpt4, slow.clone(), Duration::from_secs(10));
        let (tx, rx) = watch::channel(false);

        let cancel_task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
        });

        let outcome = adapter
            .invoke_many_controlled(
                vec![ModelRequest::text(Provider::Gpt4, "a")],
                FanOutControl {
                    cancel: Some(rx),
                    ..Default::default()
                },
            )
            .await;
        cancel_task.await.unwrap();

        assert!(matches!(outcome, FanOut::Cancelled));
        assert_eq!(slow.completed(), 0);
    }

    #[tokio::test]
    async fn test_shared_deadline_already_passed() {
        let fast = ScriptedBackend::new(vec![Step::Delay(Duration::from_millis(200), "fast".into())]);
        let adapter = adapter().with_backend(Provider::Claude37, fast, Duration::from_secs(10));

        let started = Instant::now();
        let outcome = adapter
            .invoke_many_controlled(
                vec![ModelRequest::text(Provider::Claude37, "a")],
                FanOutControl {
                    deadline: Some(Instant::now()),
                    ..Default::default()
                },
            )
            .await;

        let FanOut::Completed(responses) = outcome else {
            panic!("fan-out should complete");
        };
        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(
            responses[0].as_ref().map(|r| r.status),
            Some(ResponseStatus::Timeout)
        );
    }
}
