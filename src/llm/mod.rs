//! AI provider adapter: one normalized request/response contract over the
//! Anthropic and OpenAI backends.

pub mod adapter;
pub mod claude_provider;
pub mod interaction_log;
pub mod openai_provider;
pub mod provider;
pub mod rate_limiter;
pub mod retry;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use adapter::{FanOut, FanOutControl, JoinPolicy, ProviderAdapter};
pub use claude_provider::ClaudeProvider;
pub use interaction_log::{InteractionLogConfig, InteractionLogger};
pub use openai_provider::OpenAIProvider;
pub use provider::{LLMProvider, LLMProviderFactory, ProviderConfig};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use retry::RetryPolicy;
pub use types::*;
