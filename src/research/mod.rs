//! Web research port.
//!
//! The agent loop sends `<search>`, `<navigate>` and `<research>` payloads to a
//! [`ResearchPort`]. A port keeps a browsing session: the page it is currently
//! on and every page it has visited. Page-relative calls (`extract_info`,
//! `follow_link`) act on the current page and report `success = false`, without
//! raising, when there is none.
//!
//! # Error contract
//!
//! - `Ok(result)` with `result.success == false` is a well-formed negative
//!   answer ("no current page", "nothing matched"). It is not retried.
//! - `Err(CapabilityError)` means the call itself failed (network error,
//!   unusable input) and may be retried by [`ResilientResearch`].
//!
//! # Variants
//!
//! - [`SimulatedResearch`] serves deterministic offline pages.
//! - [`WebResearch`] fetches real pages over HTTP.
//! - [`ResilientResearch`] wraps any port with retry, timeout, caching and an
//!   error log.

pub mod plan;
pub mod resilience;
mod session;
mod simulated;
mod web;

pub use plan::{PlanStep, ResearchPlan, DEFAULT_MAX_PAGES};
pub use resilience::{
    CachePolicy, ErrorLogEntry, ResiliencePolicy, ResilientResearch, RetryStrategy,
};
pub use session::{render_observation, BrowsingSession, PageLink, WebPage};
pub use simulated::SimulatedResearch;
pub use web::{WebResearch, WebResearchConfig};

use crate::action::{ActionResult, CapabilitySource};
use crate::capability::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Every operation a research port can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchMethod {
    /// Open a URL
    Navigate,
    /// Run a web search
    Search,
    /// Pull matching text from the current page
    ExtractInfo,
    /// Follow a link on the current page
    FollowLink,
    /// Run a multi-step natural-language plan
    ExecutePlan,
    /// Compare what several sources say about a topic
    CompareSources,
    /// Look for original documents on a topic
    FindPrimarySources,
    /// Follow a topic across a time period
    TrackTopic,
    /// Pull records of one type from a page
    ExtractStructuredData,
}

impl ResearchMethod {
    /// Snake-case name used in logs, cache keys and result sources.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Search => "search",
            Self::ExtractInfo => "extract_info",
            Self::FollowLink => "follow_link",
            Self::ExecutePlan => "execute_research_plan",
            Self::CompareSources => "compare_sources",
            Self::FindPrimarySources => "find_primary_sources",
            Self::TrackTopic => "track_topic_over_time",
            Self::ExtractStructuredData => "extract_structured_data",
        }
    }

    /// Human wording used in fallback messages ("the search operation").
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::Navigate => "navigation",
            Self::Search => "search",
            Self::ExtractInfo => "information extraction",
            Self::FollowLink => "link following",
            Self::ExecutePlan => "research plan",
            Self::CompareSources => "source comparison",
            Self::FindPrimarySources => "primary source search",
            Self::TrackTopic => "topic tracking",
            Self::ExtractStructuredData => "structured data extraction",
        }
    }

    /// True for methods whose answer depends on the current page.
    #[must_use]
    pub fn is_page_relative(self) -> bool {
        matches!(
            self,
            Self::ExtractInfo | Self::FollowLink | Self::ExecutePlan
        )
    }

    /// The result source for this method.
    #[must_use]
    pub fn source(self) -> CapabilitySource {
        CapabilitySource::Research(self)
    }
}

impl fmt::Display for ResearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five baseline research operations.
#[async_trait]
pub trait ResearchPort: Send + Sync + Debug {
    /// Opens `url` and makes it the current page.
    async fn navigate(&self, url: &str) -> Result<ActionResult, CapabilityError>;

    /// Runs a web search and makes the results page current.
    async fn search(&self, query: &str) -> Result<ActionResult, CapabilityError>;

    /// Extracts information matching `selector` from the current page.
    async fn extract_info(&self, selector: &str) -> Result<ActionResult, CapabilityError>;

    /// Follows the first link on the current page whose text contains `link_text`.
    async fn follow_link(&self, link_text: &str) -> Result<ActionResult, CapabilityError>;

    /// Decomposes a natural-language plan into steps and runs them in order.
    async fn execute_research_plan(&self, plan: &str) -> Result<ActionResult, CapabilityError>;

    /// Runs a plan loading at most `max_pages` pages.
    ///
    /// The default runs [`ResearchPlan`] step by step against this port.
    async fn execute_plan_with_budget(
        &self,
        plan: &str,
        max_pages: u32,
    ) -> Result<ActionResult, CapabilityError> {
        ResearchPlan::parse(plan).run(self, max_pages).await
    }

    /// URL of the current page, if any.
    async fn current_url(&self) -> Option<String> {
        None
    }

    /// Brings the session in line with a result served from a cache instead
    /// of from this port.
    async fn replay_cached(&self, _result: &ActionResult) {}
}

/// Higher-level research operations composed from the baseline methods.
///
/// Every method has a default implementation, so any [`ResearchPort`] can opt
/// in with an empty `impl`.
#[async_trait]
pub trait ResearchExtensions: ResearchPort {
    /// Visits each URL and extracts what it says about `topic`.
    async fn compare_sources(
        &self,
        urls: &[String],
        topic: &str,
    ) -> Result<ActionResult, CapabilityError> {
        if urls.is_empty() {
            return Err(CapabilityError::invalid_input(
                ResearchMethod::CompareSources.as_str(),
                "at least one source URL is required",
            ));
        }
        let mut sections = Vec::with_capacity(urls.len());
        for url in urls {
            let visited = self.navigate(url).await?;
            let section = if visited.success {
                self.extract_info(topic).await?
            } else {
                visited
            };
            sections.push((format!("Source: {url}"), section));
        }
        Ok(combine(ResearchMethod::CompareSources, sections))
    }

    /// Searches for original documents, reports and papers about `topic`.
    async fn find_primary_sources(&self, topic: &str) -> Result<ActionResult, CapabilityError> {
        let query = format!("{topic} primary sources official reports research papers");
        let found = self.search(&query).await?;
        Ok(combine(
            ResearchMethod::FindPrimarySources,
            vec![(format!("Primary sources for {topic}"), found)],
        ))
    }

    /// Searches for how `topic` developed over `period`.
    async fn track_topic_over_time(
        &self,
        topic: &str,
        period: &str,
    ) -> Result<ActionResult, CapabilityError> {
        let recent = self.search(&format!("{topic} developments {period}")).await?;
        let history = self.search(&format!("{topic} timeline history")).await?;
        Ok(combine(
            ResearchMethod::TrackTopic,
            vec![
                (format!("Developments during {period}"), recent),
                ("Timeline".to_string(), history),
            ],
        ))
    }

    /// Opens `url` and extracts records of `data_type` from it.
    async fn extract_structured_data(
        &self,
        url: &str,
        data_type: &str,
    ) -> Result<ActionResult, CapabilityError> {
        let visited = self.navigate(url).await?;
        if !visited.success {
            return Ok(combine(
                ResearchMethod::ExtractStructuredData,
                vec![(format!("Source: {url}"), visited)],
            ));
        }
        let extracted = self.extract_info(data_type).await?;
        let records: Vec<String> = extracted
            .data
            .get("extracted_info")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        let result = combine(
            ResearchMethod::ExtractStructuredData,
            vec![(format!("{data_type} from {url}"), extracted)],
        );
        let mut data = result.data.clone();
        data["url"] = url.into();
        data["data_type"] = data_type.into();
        data["records"] = records.into();
        Ok(result.with_data(data))
    }
}

/// Merges the results of several sub-calls into one result for `method`.
///
/// The combined result succeeds if any part succeeded.
fn combine(method: ResearchMethod, sections: Vec<(String, ActionResult)>) -> ActionResult {
    let success = sections.iter().any(|(_, r)| r.success);
    let output = sections
        .iter()
        .map(|(heading, r)| format!("## {heading}\n{}", r.output))
        .collect::<Vec<_>>()
        .join("\n\n");
    let parts: Vec<_> = sections
        .iter()
        .map(|(heading, r)| {
            serde_json::json!({
                "heading": heading,
                "success": r.success,
                "data": r.data,
            })
        })
        .collect();

    let result = if success {
        ActionResult::success(method.source(), output)
    } else {
        let error = sections.iter().rev().find_map(|(_, r)| r.error.clone());
        ActionResult::failure(method.source(), output, error)
    };
    result.with_data(serde_json::json!({ "parts": parts }))
}

#[async_trait]
impl<T: ResearchPort + ?Sized> ResearchPort for Arc<T> {
    async fn navigate(&self, url: &str) -> Result<ActionResult, CapabilityError> {
        (**self).navigate(url).await
    }

    async fn search(&self, query: &str) -> Result<ActionResult, CapabilityError> {
        (**self).search(query).await
    }

    async fn extract_info(&self, selector: &str) -> Result<ActionResult, CapabilityError> {
        (**self).extract_info(selector).await
    }

    async fn follow_link(&self, link_text: &str) -> Result<ActionResult, CapabilityError> {
        (**self).follow_link(link_text).await
    }

    async fn execute_research_plan(&self, plan: &str) -> Result<ActionResult, CapabilityError> {
        (**self).execute_research_plan(plan).await
    }

    async fn execute_plan_with_budget(
        &self,
        plan: &str,
        max_pages: u32,
    ) -> Result<ActionResult, CapabilityError> {
        (**self).execute_plan_with_budget(plan, max_pages).await
    }

    async fn current_url(&self) -> Option<String> {
        (**self).current_url().await
    }

    async fn replay_cached(&self, result: &ActionResult) {
        (**self).replay_cached(result).await;
    }
}

#[async_trait]
impl<T: ResearchExtensions + ?Sized> ResearchExtensions for Arc<T> {
    async fn compare_sources(
        &self,
        urls: &[String],
        topic: &str,
    ) -> Result<ActionResult, CapabilityError> {
        (**self).compare_sources(urls, topic).await
    }

    async fn find_primary_sources(&self, topic: &str) -> Result<ActionResult, CapabilityError> {
        (**self).find_primary_sources(topic).await
    }

    async fn track_topic_over_time(
        &self,
        topic: &str,
        period: &str,
    ) -> Result<ActionResult, CapabilityError> {
        (**self).track_topic_over_time(topic, period).await
    }

    async fn extract_structured_data(
        &self,
        url: &str,
        data_type: &str,
    ) -> Result<ActionResult, CapabilityError> {
        (**self).extract_structured_data(url, data_type).await
    }
}
