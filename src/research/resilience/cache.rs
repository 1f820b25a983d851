//! In-memory result cache for research calls.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     ResultCache                      │
//! │                                                      │
//! │  get(key) -> Option<ActionResult>                    │
//! │  put(key, result)     // success = true only         │
//! │  clear()                                             │
//! │                                                      │
//! │  Internal: Mutex<HashMap<CacheKey, CacheEntry>>      │
//! │  Key: method + normalized args (+ current page URL)  │
//! └──────────────────────────────────────────────────────┘
//! ```

use super::CachePolicy;
use crate::action::ActionResult;
use crate::research::ResearchMethod;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Identifies a research call for caching.
///
/// Arguments are trimmed and runs of whitespace collapsed, so
/// `"rust  async"` and `" rust async "` share an entry. Page-relative calls
/// carry the URL of the page they ran against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: ResearchMethod,
    args: Vec<String>,
    page: Option<String>,
}

impl CacheKey {
    /// Builds a key from a method, its arguments and an optional page scope.
    #[must_use]
    pub fn new(method: ResearchMethod, args: &[&str], page: Option<&str>) -> Self {
        Self {
            method,
            args: args
                .iter()
                .map(|a| a.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect(),
            page: page.map(str::to_string),
        }
    }

    /// The method this key belongs to.
    #[must_use]
    pub fn method(&self) -> ResearchMethod {
        self.method
    }
}

#[derive(Debug)]
struct CacheEntry {
    result: ActionResult,
    stored_at: Instant,
}

/// Successful research results keyed by call.
///
/// Failed or degraded results are never stored, so a later identical call
/// gets a fresh attempt.
#[derive(Debug)]
pub struct ResultCache {
    policy: CachePolicy,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ResultCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up a stored result. Expired entries are dropped on the way.
    pub async fn get(&self, key: &CacheKey) -> Option<ActionResult> {
        if !self.policy.is_enabled() {
            return None;
        }
        let mut guard = self.entries.lock().await;
        let entry = guard.get(key)?;
        if let CachePolicy::Ttl(ttl) = self.policy {
            if entry.stored_at.elapsed() >= ttl {
                guard.remove(key);
                tracing::trace!(method = %key.method, "research cache entry expired");
                return None;
            }
        }
        tracing::debug!(method = %key.method, "research cache hit");
        Some(entry.result.clone())
    }

    /// Stores `result` if caching is on and the result succeeded.
    pub async fn put(&self, key: CacheKey, result: &ActionResult) {
        if !self.policy.is_enabled() || !result.success || result.is_degraded() {
            return;
        }
        let mut guard = self.entries.lock().await;
        if let CachePolicy::Ttl(ttl) = self.policy {
            guard.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        }
        guard.insert(
            key,
            CacheEntry {
                result: result.clone(),
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// True if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityError;
    use std::time::Duration;

    fn ok(text: &str) -> ActionResult {
        ActionResult::success(ResearchMethod::Search.source(), text)
    }

    #[test]
    fn keys_normalize_whitespace() {
        assert_eq!(
            CacheKey::new(ResearchMethod::Search, &["  rust   async "], None),
            CacheKey::new(ResearchMethod::Search, &["rust async"], None)
        );
        assert_ne!(
            CacheKey::new(ResearchMethod::Search, &["rust"], None),
            CacheKey::new(ResearchMethod::Navigate, &["rust"], None)
        );
    }

    #[test]
    fn page_scope_separates_keys() {
        let a = CacheKey::new(ResearchMethod::ExtractInfo, &["price"], Some("https://a.example"));
        let b = CacheKey::new(ResearchMethod::ExtractInfo, &["price"], Some("https://b.example"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn stores_only_successful_results() {
        let cache = ResultCache::new(CachePolicy::UntilCleared);
        let key = CacheKey::new(ResearchMethod::Search, &["q"], None);

        let failed = ActionResult::failure(
            ResearchMethod::Search.source(),
            "no",
            Some(CapabilityError::failure("search", "boom")),
        );
        cache.put(key.clone(), &failed).await;
        assert!(cache.get(&key).await.is_none());

        cache.put(key.clone(), &ok("yes")).await;
        assert_eq!(cache.get(&key).await.map(|r| r.output), Some("yes".to_string()));
    }

    #[tokio::test]
    async fn disabled_cache_stores_nothing() {
        let cache = ResultCache::new(CachePolicy::Disabled);
        let key = CacheKey::new(ResearchMethod::Search, &["q"], None);
        cache.put(key.clone(), &ok("yes")).await;
        assert!(cache.is_empty().await);
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_entries_expire() {
        let cache = ResultCache::new(CachePolicy::Ttl(Duration::from_secs(10)));
        let key = CacheKey::new(ResearchMethod::Search, &["q"], None);
        cache.put(key.clone(), &ok("yes")).await;

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cache.get(&key).await.is_some());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cache.get(&key).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = ResultCache::new(CachePolicy::UntilCleared);
        cache
            .put(CacheKey::new(ResearchMethod::Search, &["q"], None), &ok("a"))
            .await;
        assert_eq!(cache.len().await, 1);
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
