//! Retry, timeout and cache settings for the resilience decorator.

use crate::config::AgentConfig;
use crate::research::DEFAULT_MAX_PAGES;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ceiling for exponential retry delays.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// The same delay before every retry
    #[default]
    Fixed,
    /// `delay * n` before retry `n`
    Linear,
    /// `delay * 2^(n-1)` before retry `n`, capped at [`MAX_RETRY_DELAY`]
    Exponential,
}

/// Which successful results are kept for reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Keep entries until the cache is cleared explicitly
    #[default]
    UntilCleared,
    /// Keep entries for a fixed time after they were stored
    Ttl(Duration),
    /// Never cache
    Disabled,
}

impl CachePolicy {
    /// True unless caching is switched off.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Settings applied to every decorated research call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResiliencePolicy {
    /// Retries after the first attempt; a call makes at most `max_retries + 1` attempts
    pub max_retries: u32,
    /// Base delay between attempts
    pub retry_delay: Duration,
    /// How the delay grows
    pub strategy: RetryStrategy,
    /// Wall-clock budget for one attempt
    pub attempt_timeout: Duration,
    /// Result caching
    pub cache: CachePolicy,
    /// Page budget handed to research plans
    pub max_pages: u32,
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            strategy: RetryStrategy::Fixed,
            attempt_timeout: Duration::from_secs(120),
            cache: CachePolicy::UntilCleared,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl ResiliencePolicy {
    /// Creates a policy with default delays and the given retry count.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Derives the policy from the agent configuration.
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            strategy: config.retry_strategy,
            attempt_timeout: config.research_timeout,
            cache: config.cache_policy,
            max_pages: config.max_pages_per_task,
        }
    }

    /// Disables retries.
    #[must_use]
    pub fn no_retries() -> Self {
        Self::new(0)
    }

    /// Sets the base delay between attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets how the delay grows.
    #[must_use]
    pub fn with_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Sets the cache policy.
    #[must_use]
    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the page budget for research plans.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Total attempts a failing call makes.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry `retry` (1-based). Retry 0 is the first attempt and
    /// has no delay.
    #[must_use]
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        match self.strategy {
            RetryStrategy::Fixed => self.retry_delay,
            RetryStrategy::Linear => self.retry_delay.saturating_mul(retry),
            RetryStrategy::Exponential => {
                let multiplier = 2u32.saturating_pow(retry - 1);
                self.retry_delay
                    .saturating_mul(multiplier)
                    .min(MAX_RETRY_DELAY)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_agent_defaults() {
        let policy = ResiliencePolicy::from_config(&AgentConfig::default());
        assert_eq!(policy, ResiliencePolicy::default());
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn page_budget_comes_from_agent_config() {
        let config = AgentConfig::new().with_max_pages_per_task(3);
        assert_eq!(ResiliencePolicy::from_config(&config).max_pages, 3);
        assert_eq!(ResiliencePolicy::default().max_pages, DEFAULT_MAX_PAGES);
    }

    #[test]
    fn fixed_delay_is_constant() {
        let policy = ResiliencePolicy::default().with_retry_delay(Duration::from_secs(2));
        assert_eq!(policy.delay_before_retry(0), Duration::ZERO);
        assert_eq!(policy.delay_before_retry(1), Duration::from_secs(2));
        assert_eq!(policy.delay_before_retry(3), Duration::from_secs(2));
    }

    #[test]
    fn linear_delay_grows_by_base() {
        let policy = ResiliencePolicy::default()
            .with_retry_delay(Duration::from_millis(500))
            .with_strategy(RetryStrategy::Linear);
        assert_eq!(policy.delay_before_retry(1), Duration::from_millis(500));
        assert_eq!(policy.delay_before_retry(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_before_retry(4), Duration::from_millis(2000));
    }

    #[test]
    fn exponential_delay_doubles_and_caps() {
        let policy = ResiliencePolicy::default()
            .with_retry_delay(Duration::from_secs(1))
            .with_strategy(RetryStrategy::Exponential);
        assert_eq!(policy.delay_before_retry(1), Duration::from_secs(1));
        assert_eq!(policy.delay_before_retry(2), Duration::from_secs(2));
        assert_eq!(policy.delay_before_retry(3), Duration::from_secs(4));
        assert_eq!(policy.delay_before_retry(10), MAX_RETRY_DELAY);
        assert_eq!(policy.delay_before_retry(100), MAX_RETRY_DELAY);
    }

    #[test]
    fn no_retries_means_one_attempt() {
        assert_eq!(ResiliencePolicy::no_retries().max_attempts(), 1);
    }

    #[test]
    fn strategy_parses_from_lowercase() {
        let strategy: RetryStrategy = serde_json::from_str("\"exponential\"").unwrap();
        assert_eq!(strategy, RetryStrategy::Exponential);
    }

    #[test]
    fn disabled_cache_is_not_enabled() {
        assert!(CachePolicy::UntilCleared.is_enabled());
        assert!(CachePolicy::Ttl(Duration::from_secs(5)).is_enabled());
        assert!(!CachePolicy::Disabled.is_enabled());
    }
}
