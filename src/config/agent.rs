//! Agent configuration.
//!
//! Limits and resilience settings for one [`AgentController`](crate::agent::AgentController).
//! The configuration is resolved once, validated, and then never changes for
//! the lifetime of the controller.

use crate::error::CodeActError;
use crate::research::{CachePolicy, RetryStrategy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings that bound and shape an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of model queries per interaction
    pub max_turns: u32,
    /// Whether research-family actions are dispatched
    pub enable_research: bool,
    /// Wall-clock budget for one research attempt
    pub research_timeout: Duration,
    /// Page budget for one research plan
    pub max_pages_per_task: u32,
    /// Retries after a failed research attempt
    pub max_retries: u32,
    /// Base delay between research attempts
    pub retry_delay: Duration,
    /// How the retry delay grows
    pub retry_strategy: RetryStrategy,
    /// Which research results are cached
    pub cache_policy: CachePolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 5,
            enable_research: true,
            research_timeout: Duration::from_secs(120),
            max_pages_per_task: 10,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            retry_strategy: RetryStrategy::Fixed,
            cache_policy: CachePolicy::UntilCleared,
        }
    }
}

impl AgentConfig {
    /// Creates a configuration with default values.
    ///
    /// # Examples
    ///
    /// ```
    /// use codeact::config::AgentConfig;
    ///
    /// let config = AgentConfig::new().with_max_turns(3).with_research(false);
    /// assert_eq!(config.max_turns, 3);
    /// assert!(config.validate().is_ok());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the turn budget.
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Enables or disables research-family actions.
    #[must_use]
    pub fn with_research(mut self, enable: bool) -> Self {
        self.enable_research = enable;
        self
    }

    /// Sets the per-attempt research timeout.
    #[must_use]
    pub fn with_research_timeout(mut self, timeout: Duration) -> Self {
        self.research_timeout = timeout;
        self
    }

    /// Sets the page budget for research plans.
    #[must_use]
    pub fn with_max_pages_per_task(mut self, pages: u32) -> Self {
        self.max_pages_per_task = pages;
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base retry delay.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets how the retry delay grows.
    #[must_use]
    pub fn with_retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Sets the research cache policy.
    #[must_use]
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Checks every field is in range.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first invalid field.
    pub fn validate(&self) -> Result<(), CodeActError> {
        if self.max_turns == 0 {
            return Err(CodeActError::configuration(
                "max_turns",
                "must be greater than zero",
            ));
        }
        if self.research_timeout.is_zero() {
            return Err(CodeActError::configuration(
                "research_timeout",
                "must be greater than zero",
            ));
        }
        if self.max_pages_per_task == 0 {
            return Err(CodeActError::configuration(
                "max_pages_per_task",
                "must be greater than zero",
            ));
        }
        if let CachePolicy::Ttl(ttl) = self.cache_policy {
            if ttl.is_zero() {
                return Err(CodeActError::configuration(
                    "cache_policy",
                    "ttl must be greater than zero; use the disabled policy to turn caching off",
                ));
            }
        }
        Ok(())
    }
}
