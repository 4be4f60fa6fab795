use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Per-provider pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum spacing between consecutive calls to one provider.
    pub min_interval_ms: u64,
    pub max_requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 500,
            max_requests_per_minute: 50,
        }
    }
}

/// Pacing limiter: callers wait for a slot instead of being rejected.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<Mutex<RateLimiterState>>,
}

#[derive(Debug, Default)]
struct RateLimiterState {
    last_request: Option<Instant>,
    window: VecDeque<Instant>,
}

const WINDOW: Duration = Duration::from_secs(60);

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(RateLimiterState::default())),
        }
    }

    /// Wait until a request may be sent, then reserve the slot.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                while let Some(front) = state.window.front() {
                    if now.duration_since(*front) >= WINDOW {
                        state.window.pop_front();
                    } else {
                        break;
                    }
                }

                let interval_wait = state
                    .last_request
                    .map(|last| {
                        (last + Duration::from_millis(self.config.min_interval_ms))
                            .saturating_duration_since(now)
                    })
                    .unwrap_or_default();

                let window_wait = if self.config.max_requests_per_minute > 0
                    && state.window.len() >= self.config.max_requests_per_minute as usize
                {
                    state
                        .window
                        .front()
                        .map(|oldest| (*oldest + WINDOW).saturating_duration_since(now))
                        .unwrap_or_default()
                } else {
                    Duration::ZERO
                };

                let wait = interval_wait.max(window_wait);
                if wait.is_zero() {
                    state.last_request = Some(now);
                    state.window.push_back(now);
                    return;
                }
                wait
            };

            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_min_interval_spaces_calls() {
        let limiter = RateLimiter::new(RateLimitConfig {
            min_interval_ms: 40,
            max_requests_per_minute: 100,
        });

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_zero_limits_never_wait() {
        let limiter = RateLimiter::new(RateLimitConfig {
            min_interval_ms: 0,
            max_requests_per_minute: 0,
        });

        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
