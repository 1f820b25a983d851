//! Configuration file types.
//!
//! These types mirror the TOML file layout. Every field is optional; anything
//! left out falls back to the library default.

use super::AgentConfig;
use crate::error::CodeActError;
use crate::execution::{CodeDelivery, ProcessExecutor};
use crate::logging::LoggingConfig;
use crate::research::{CachePolicy, RetryStrategy, WebResearchConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeActConfig {
    /// `[agent]`: loop limits and research resilience
    pub agent: AgentFileConfig,
    /// `[execution]`: how code is run
    pub execution: ExecutionFileConfig,
    /// `[research]`: which research backend to use
    pub research: ResearchFileConfig,
    /// `[logging]`: where events go
    pub logging: LoggingConfig,
}

impl CodeActConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the agent settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a value is out of range.
    pub fn agent_config(&self) -> Result<AgentConfig, CodeActError> {
        self.agent.to_agent_config()
    }
}

/// Cache modes accepted in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Keep results until cleared
    #[default]
    UntilCleared,
    /// Keep results for `cache_ttl_secs`
    Ttl,
    /// Never cache
    Disabled,
}

/// The `[agent]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentFileConfig {
    /// Maximum model queries per interaction
    pub max_turns: Option<u32>,
    /// Whether research actions are dispatched
    pub enable_research: Option<bool>,
    /// Per-attempt research timeout in seconds
    pub research_timeout_secs: Option<u64>,
    /// Page budget for research plans
    pub max_pages_per_task: Option<u32>,
    /// Retries after a failed research attempt
    pub max_retries: Option<u32>,
    /// Base retry delay in seconds; fractions allowed
    pub retry_delay_secs: Option<f64>,
    /// `fixed`, `linear` or `exponential`
    pub retry_strategy: Option<RetryStrategy>,
    /// `until_cleared`, `ttl` or `disabled`
    pub cache: Option<CacheMode>,
    /// Lifetime of cache entries when `cache = "ttl"`
    pub cache_ttl_secs: Option<u64>,
}

impl AgentFileConfig {
    /// Applies the table on top of [`AgentConfig::default`] and validates the result.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for negative delays, a missing TTL, or
    /// anything [`AgentConfig::validate`] rejects.
    pub fn to_agent_config(&self) -> Result<AgentConfig, CodeActError> {
        let defaults = AgentConfig::default();

        let retry_delay = match self.retry_delay_secs {
            Some(secs) => Duration::try_from_secs_f64(secs).map_err(|e| {
                CodeActError::configuration("agent.retry_delay_secs", e.to_string())
            })?,
            None => defaults.retry_delay,
        };

        let cache_policy = match (self.cache, self.cache_ttl_secs) {
            (None, _) => defaults.cache_policy,
            (Some(CacheMode::UntilCleared), _) => CachePolicy::UntilCleared,
            (Some(CacheMode::Disabled), _) => CachePolicy::Disabled,
            (Some(CacheMode::Ttl), Some(secs)) => CachePolicy::Ttl(Duration::from_secs(secs)),
            (Some(CacheMode::Ttl), None) => {
                return Err(CodeActError::configuration(
                    "agent.cache_ttl_secs",
                    "required when cache = \"ttl\"",
                ));
            }
        };

        let config = AgentConfig {
            max_turns: self.max_turns.unwrap_or(defaults.max_turns),
            enable_research: self.enable_research.unwrap_or(defaults.enable_research),
            research_timeout: self
                .research_timeout_secs
                .map_or(defaults.research_timeout, Duration::from_secs),
            max_pages_per_task: self
                .max_pages_per_task
                .unwrap_or(defaults.max_pages_per_task),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_delay,
            retry_strategy: self.retry_strategy.unwrap_or(defaults.retry_strategy),
            cache_policy,
        };
        config.validate()?;
        Ok(config)
    }
}

/// The `[execution]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionFileConfig {
    /// Interpreter binary, e.g. `python3` or `node`
    pub interpreter: Option<String>,
    /// Extra arguments placed before the code
    pub args: Vec<String>,
    /// Pass code inline after this flag instead of through a temp file
    pub inline_flag: Option<String>,
    /// Temp file suffix, e.g. `.js`
    pub extension: Option<String>,
    /// Per-run timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl ExecutionFileConfig {
    /// Builds the executor described by this table.
    #[must_use]
    pub fn to_executor(&self) -> ProcessExecutor {
        let mut executor = ProcessExecutor::new();
        if let Some(interpreter) = &self.interpreter {
            executor = executor.with_interpreter(interpreter.clone());
        }
        if !self.args.is_empty() {
            executor = executor.with_args(self.args.iter().cloned());
        }
        if let Some(flag) = &self.inline_flag {
            executor = executor.with_delivery(CodeDelivery::Inline { flag: flag.clone() });
        } else if let Some(extension) = &self.extension {
            executor = executor.with_delivery(CodeDelivery::TempFile {
                extension: extension.clone(),
            });
        }
        if let Some(secs) = self.timeout_secs {
            executor = executor.with_timeout(Duration::from_secs(secs));
        }
        executor
    }
}

/// Research backends selectable from the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchBackend {
    /// Deterministic offline pages
    #[default]
    Simulated,
    /// Live HTTP fetching
    Web,
}

/// The `[research]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchFileConfig {
    /// Which backend serves research calls
    pub backend: ResearchBackend,
    /// Search endpoint template containing `{query}`
    pub search_url: Option<String>,
    /// `User-Agent` header for the web backend
    pub user_agent: Option<String>,
    /// HTTP timeout per request in seconds
    pub request_timeout_secs: Option<u64>,
}

impl ResearchFileConfig {
    /// Settings for the web backend, using `max_pages` as the plan page budget.
    #[must_use]
    pub fn to_web_config(&self, max_pages: u32) -> WebResearchConfig {
        let defaults = WebResearchConfig::default();
        WebResearchConfig {
            search_url: self.search_url.clone().unwrap_or(defaults.search_url),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            request_timeout: self
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            max_pages,
            ..defaults
        }
    }
}
