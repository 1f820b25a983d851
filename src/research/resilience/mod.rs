//! Retry, timeout, caching and error logging around a research port.
//!
//! [`ResilientResearch`] implements [`ResearchPort`] itself, so the agent loop
//! cannot tell whether it talks to a bare port or a decorated one. Every call
//! goes through the same pipeline:
//!
//! 1. Look the call up in the [`ResultCache`]; a hit is returned as is.
//! 2. Run the inner call under the per-attempt timeout.
//! 3. On `Err` or timeout, log an [`ErrorLogEntry`], wait the retry delay and
//!    try again, up to `max_retries` more times.
//! 4. On success, cache the result (if it succeeded) and return it.
//! 5. When every attempt failed, return a degraded `success = false` result
//!    with a fallback message. The decorator never returns `Err`.
//!
//! An `Ok` result with `success = false` is an answer, not a failure: it is
//! returned immediately and not cached.

mod cache;
mod error_log;
mod policy;

pub use cache::{CacheKey, ResultCache};
pub use error_log::{ErrorLog, ErrorLogEntry};
pub use policy::{CachePolicy, ResiliencePolicy, RetryStrategy, MAX_RETRY_DELAY};

use super::{render_observation, ResearchExtensions, ResearchMethod, ResearchPort};
use crate::action::ActionResult;
use crate::capability::CapabilityError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::json;

/// A research port wrapped with retries, timeouts, a cache and an error log.
///
/// # Example
///
/// ```
/// use codeact::research::{ResiliencePolicy, ResilientResearch, ResearchPort, SimulatedResearch};
///
/// # tokio_test::block_on(async {
/// let port = ResilientResearch::new(SimulatedResearch::new(), ResiliencePolicy::default());
/// let first = port.search("rust async").await.unwrap();
/// let second = port.search("rust   async").await.unwrap();
/// assert_eq!(first, second);
/// assert!(port.get_error_log().await.is_empty());
/// # });
/// ```
#[derive(Debug)]
pub struct ResilientResearch<R> {
    inner: R,
    policy: ResiliencePolicy,
    cache: ResultCache,
    errors: ErrorLog,
}

impl<R: ResearchPort> ResilientResearch<R> {
    /// Wraps `inner` with the given policy.
    #[must_use]
    pub fn new(inner: R, policy: ResiliencePolicy) -> Self {
        Self {
            inner,
            cache: ResultCache::new(policy.cache),
            errors: ErrorLog::new(),
            policy,
        }
    }

    /// The wrapped port.
    #[must_use]
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> &ResiliencePolicy {
        &self.policy
    }

    /// Every failed attempt so far, oldest first.
    pub async fn get_error_log(&self) -> Vec<ErrorLogEntry> {
        self.errors.snapshot().await
    }

    /// Forgets all logged failures.
    pub async fn clear_error_log(&self) {
        self.errors.clear().await;
    }

    /// Drops every cached result.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Number of cached results.
    pub async fn cache_len(&self) -> usize {
        self.cache.len().await
    }

    /// Runs one decorated call.
    ///
    /// `op` is invoked once per attempt and must start a fresh inner call each
    /// time.
    async fn call<'a, F>(&'a self, method: ResearchMethod, args: &[&str], op: F) -> ActionResult
    where
        F: Fn() -> BoxFuture<'a, Result<ActionResult, CapabilityError>> + Send + Sync,
    {
        let page = if method.is_page_relative() {
            self.inner.current_url().await
        } else {
            None
        };
        let key = CacheKey::new(method, args, page.as_deref());

        if let Some(hit) = self.cache.get(&key).await {
            self.inner.replay_cached(&hit).await;
            return hit;
        }

        let payload = args.join(" | ");
        let mut last_error = None;
        let mut attempts = 0;

        for attempt in 0..self.policy.max_attempts() {
            if attempt > 0 {
                let delay = self.policy.delay_before_retry(attempt);
                tracing::warn!(
                    %method,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying research call"
                );
                tokio::time::sleep(delay).await;
            }

            attempts += 1;
            let outcome = match tokio::time::timeout(self.policy.attempt_timeout, op()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(CapabilityError::timeout(
                    method.as_str(),
                    self.policy.attempt_timeout,
                )),
            };

            match outcome {
                Ok(result) => {
                    if attempt > 0 {
                        tracing::info!(%method, attempt, "research call recovered after retry");
                    }
                    self.cache.put(key, &result).await;
                    return result;
                }
                Err(error) => {
                    tracing::warn!(%method, attempt, error = %error, "research attempt failed");
                    self.errors
                        .record(ErrorLogEntry::new(method, &payload, error.clone(), attempt))
                        .await;
                    let retriable = error.is_retriable();
                    last_error = Some(error);
                    if !retriable {
                        break;
                    }
                }
            }
        }

        let error = last_error.unwrap_or_else(|| {
            CapabilityError::failure(method.as_str(), "no attempt was made")
        });
        tracing::error!(%method, error = %error, "research call degraded to fallback");
        self.degraded(method, error, attempts).await
    }

    async fn degraded(
        &self,
        method: ResearchMethod,
        error: CapabilityError,
        attempts: u32,
    ) -> ActionResult {
        let message = format!(
            "{error}\nThe {} operation could not be completed due to an error. \
             Please try again or try a different approach.",
            method.describe()
        );
        let current = self.inner.current_url().await;
        let output = render_observation(Err(&message), current.as_deref(), &[]);
        ActionResult::failure(method.source(), output, Some(error)).with_data(json!({
            "degraded": true,
            "fallback": true,
            "attempts": attempts,
        }))
    }
}

#[async_trait]
impl<R: ResearchPort> ResearchPort for ResilientResearch<R> {
    async fn navigate(&self, url: &str) -> Result<ActionResult, CapabilityError> {
        Ok(self
            .call(ResearchMethod::Navigate, &[url], || self.inner.navigate(url))
            .await)
    }

    async fn search(&self, query: &str) -> Result<ActionResult, CapabilityError> {
        Ok(self
            .call(ResearchMethod::Search, &[query], || self.inner.search(query))
            .await)
    }

    async fn extract_info(&self, selector: &str) -> Result<ActionResult, CapabilityError> {
        Ok(self
            .call(ResearchMethod::ExtractInfo, &[selector], || {
                self.inner.extract_info(selector)
            })
            .await)
    }

    async fn follow_link(&self, link_text: &str) -> Result<ActionResult, CapabilityError> {
        Ok(self
            .call(ResearchMethod::FollowLink, &[link_text], || {
                self.inner.follow_link(link_text)
            })
            .await)
    }

    async fn execute_research_plan(&self, plan: &str) -> Result<ActionResult, CapabilityError> {
        self.execute_plan_with_budget(plan, self.policy.max_pages)
            .await
    }

    async fn execute_plan_with_budget(
        &self,
        plan: &str,
        max_pages: u32,
    ) -> Result<ActionResult, CapabilityError> {
        let budget = max_pages.to_string();
        Ok(self
            .call(ResearchMethod::ExecutePlan, &[plan, budget.as_str()], || {
                self.inner.execute_plan_with_budget(plan, max_pages)
            })
            .await)
    }

    async fn current_url(&self) -> Option<String> {
        self.inner.current_url().await
    }

    async fn replay_cached(&self, result: &ActionResult) {
        self.inner.replay_cached(result).await;
    }
}

#[async_trait]
impl<R: ResearchExtensions> ResearchExtensions for ResilientResearch<R> {
    async fn compare_sources(
        &self,
        urls: &[String],
        topic: &str,
    ) -> Result<ActionResult, CapabilityError> {
        let joined = urls.join(" ");
        Ok(self
            .call(ResearchMethod::CompareSources, &[joined.as_str(), topic], || {
                self.inner.compare_sources(urls, topic)
            })
            .await)
    }

    async fn find_primary_sources(&self, topic: &str) -> Result<ActionResult, CapabilityError> {
        Ok(self
            .call(ResearchMethod::FindPrimarySources, &[topic], || {
                self.inner.find_primary_sources(topic)
            })
            .await)
    }

    async fn track_topic_over_time(
        &self,
        topic: &str,
        period: &str,
    ) -> Result<ActionResult, CapabilityError> {
        Ok(self
            .call(ResearchMethod::TrackTopic, &[topic, period], || {
                self.inner.track_topic_over_time(topic, period)
            })
            .await)
    }

    async fn extract_structured_data(
        &self,
        url: &str,
        data_type: &str,
    ) -> Result<ActionResult, CapabilityError> {
        Ok(self
            .call(ResearchMethod::ExtractStructuredData, &[url, data_type], || {
                self.inner.extract_structured_data(url, data_type)
            })
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::{SimulatedResearch, WebPage};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` calls to `search`, then succeeds.
    #[derive(Debug, Default)]
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        hang: bool,
    }

    impl Flaky {
        fn failing(failures: u32) -> Self {
            Self {
                failures,
                ..Self::default()
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ResearchPort for Flaky {
        async fn navigate(&self, url: &str) -> Result<ActionResult, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CapabilityError::invalid_input("navigate", format!("bad url {url}")))
        }

        async fn search(&self, query: &str) -> Result<ActionResult, CapabilityError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if n < self.failures {
                Err(CapabilityError::failure("search", "503 Service Unavailable"))
            } else {
                Ok(ActionResult::success(
                    ResearchMethod::Search.source(),
                    format!("results for {query}"),
                ))
            }
        }

        async fn extract_info(&self, _selector: &str) -> Result<ActionResult, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ActionResult::failure(
                ResearchMethod::ExtractInfo.source(),
                "No current page to extract from",
                None,
            ))
        }

        async fn follow_link(&self, _link_text: &str) -> Result<ActionResult, CapabilityError> {
            unimplemented!()
        }

        async fn execute_research_plan(&self, _plan: &str) -> Result<ActionResult, CapabilityError> {
            unimplemented!()
        }
    }

    fn policy(max_retries: u32) -> ResiliencePolicy {
        ResiliencePolicy::new(max_retries).with_retry_delay(Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_call_makes_max_retries_plus_one_attempts() {
        let port = ResilientResearch::new(Flaky::failing(u32::MAX), policy(3));
        let result = port.search("rust").await.unwrap();

        assert_eq!(port.inner().calls(), 4);
        assert!(!result.success);
        assert!(result.is_degraded());
        assert_eq!(result.data["attempts"], 4);
        assert!(result
            .output
            .contains("The search operation could not be completed due to an error."));

        let log = port.get_error_log().await;
        assert_eq!(log.len(), 4);
        assert_eq!(
            log.iter().map(|e| e.retry_count).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert!(log.iter().all(|e| e.method == ResearchMethod::Search && e.payload == "rust"));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_wait_the_configured_delay() {
        let port = ResilientResearch::new(Flaky::failing(2), policy(3));
        let start = tokio::time::Instant::now();
        let result = port.search("rust").await.unwrap();

        assert!(result.success);
        assert_eq!(port.inner().calls(), 3);
        assert!(start.elapsed() >= Duration::from_secs(4));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(port.get_error_log().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_attempts_time_out() {
        let inner = Flaky {
            hang: true,
            ..Flaky::default()
        };
        let port = ResilientResearch::new(
            inner,
            policy(1).with_attempt_timeout(Duration::from_secs(5)),
        );
        let result = port.search("slow").await.unwrap();

        assert!(result.is_degraded());
        let log = port.get_error_log().await;
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|e| e.error.is_timeout()));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_input_is_not_retried() {
        let port = ResilientResearch::new(Flaky::default(), policy(3));
        let result = port.navigate("::").await.unwrap();

        assert!(result.is_degraded());
        assert_eq!(port.inner().calls(), 1);
        assert_eq!(port.get_error_log().await.len(), 1);
    }

    #[tokio::test]
    async fn negative_answers_are_neither_retried_nor_cached() {
        let port = ResilientResearch::new(Flaky::default(), policy(3));
        let first = port.extract_info("x").await.unwrap();
        let second = port.extract_info("x").await.unwrap();

        assert!(!first.success);
        assert!(!first.is_degraded());
        assert_eq!(first, second);
        assert_eq!(port.inner().calls(), 2);
        assert!(port.get_error_log().await.is_empty());
        assert_eq!(port.cache_len().await, 0);
    }

    #[tokio::test]
    async fn successful_results_are_served_from_cache() {
        let port = ResilientResearch::new(Flaky::default(), policy(3));
        let first = port.search("rust async").await.unwrap();
        let second = port.search("  rust   async ").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(port.inner().calls(), 1);

        port.clear_cache().await;
        port.search("rust async").await.unwrap();
        assert_eq!(port.inner().calls(), 2);
    }

    #[tokio::test]
    async fn disabled_cache_calls_through() {
        let port = ResilientResearch::new(
            Flaky::default(),
            policy(0).with_cache(CachePolicy::Disabled),
        );
        port.search("a").await.unwrap();
        port.search("a").await.unwrap();
        assert_eq!(port.inner().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_not_cached() {
        let port = ResilientResearch::new(Flaky::failing(1), policy(0));
        let first = port.search("q").await.unwrap();
        assert!(first.is_degraded());

        let second = port.search("q").await.unwrap();
        assert!(second.success);
        assert_eq!(port.inner().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_error_log_empties_it() {
        let port = ResilientResearch::new(Flaky::failing(1), policy(0));
        port.search("q").await.unwrap();
        assert_eq!(port.get_error_log().await.len(), 1);
        port.clear_error_log().await;
        assert!(port.get_error_log().await.is_empty());
    }

    #[tokio::test]
    async fn page_relative_cache_is_scoped_to_current_page() {
        let inner = SimulatedResearch::new()
            .with_page(WebPage::new("https://a.example", "A", "price: 10"))
            .with_page(WebPage::new("https://b.example", "B", "price: 20"));
        let port = ResilientResearch::new(inner, ResiliencePolicy::default());

        port.navigate("https://a.example").await.unwrap();
        let on_a = port.extract_info("price").await.unwrap();
        port.navigate("https://b.example").await.unwrap();
        let on_b = port.extract_info("price").await.unwrap();

        assert_eq!(on_a.data["extracted_info"], "price: 10");
        assert_eq!(on_b.data["extracted_info"], "price: 20");
    }

    #[tokio::test]
    async fn cached_navigation_still_moves_the_session() {
        let port = ResilientResearch::new(SimulatedResearch::new(), ResiliencePolicy::default());
        port.navigate("https://a.example").await.unwrap();
        port.navigate("https://b.example").await.unwrap();
        port.navigate("https://a.example").await.unwrap();

        assert_eq!(port.current_url().await.as_deref(), Some("https://a.example"));
        assert_eq!(
            port.inner().session().await.visited(),
            ["https://a.example", "https://b.example", "https://a.example"]
        );
    }

    #[tokio::test]
    async fn cached_plan_restores_the_page_it_ended_on() {
        let port = ResilientResearch::new(SimulatedResearch::new(), ResiliencePolicy::default());
        let plan = "Navigate to https://b.example";

        port.navigate("https://a.example").await.unwrap();
        let first = port.execute_research_plan(plan).await.unwrap();
        assert_eq!(port.current_url().await.as_deref(), Some("https://b.example"));

        port.navigate("https://a.example").await.unwrap();
        let second = port.execute_research_plan(plan).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(port.cache_len().await, 2);
        assert_eq!(port.current_url().await.as_deref(), Some("https://b.example"));
        assert_eq!(
            port.inner().session().await.visited(),
            [
                "https://a.example",
                "https://b.example",
                "https://a.example",
                "https://b.example"
            ]
        );
    }

    #[tokio::test]
    async fn plans_use_the_policy_page_budget() {
        let port = ResilientResearch::new(
            SimulatedResearch::new(),
            ResiliencePolicy::default().with_max_pages(1),
        );
        let result = port
            .execute_research_plan(
                "Navigate to https://x.example/1\nNavigate to https://x.example/2",
            )
            .await
            .unwrap();

        assert!(!result.success);
        assert!(!result.is_degraded());
        assert_eq!(result.data["pages_used"], 1);
        assert!(result.output.contains("completed 1 of 2 steps"));
    }

    #[tokio::test]
    async fn extensions_are_decorated_too() {
        let port = ResilientResearch::new(SimulatedResearch::new(), ResiliencePolicy::default());
        let first = port.find_primary_sources("fusion energy").await.unwrap();
        let second = port.find_primary_sources("fusion  energy").await.unwrap();
        assert!(first.success);
        assert_eq!(first, second);
        assert_eq!(port.cache_len().await, 1);
    }
}
