//! Offline research port with deterministic pages.

use super::{
    BrowsingSession, ResearchExtensions, ResearchMethod, ResearchPort, WebPage, DEFAULT_MAX_PAGES,
};
use crate::action::ActionResult;
use crate::capability::CapabilityError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// A research port that never touches the network.
///
/// Pages registered with [`with_page`](Self::with_page) are served as given.
/// Any other URL gets a generated placeholder page, so every call succeeds
/// and the same sequence of calls always produces the same results.
///
/// # Example
///
/// ```
/// use codeact::research::{ResearchPort, SimulatedResearch, WebPage};
///
/// # tokio_test::block_on(async {
/// let port = SimulatedResearch::new()
///     .with_page(WebPage::new("https://docs.example", "Docs", "Install with cargo"));
/// let result = port.navigate("https://docs.example").await.unwrap();
/// assert!(result.success);
/// assert!(result.output.contains("Install with cargo"));
/// # });
/// ```
#[derive(Debug)]
pub struct SimulatedResearch {
    session: Mutex<BrowsingSession>,
    pages: HashMap<String, WebPage>,
    max_pages: u32,
}

impl Default for SimulatedResearch {
    fn default() -> Self {
        Self {
            session: Mutex::new(BrowsingSession::new()),
            pages: HashMap::new(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl SimulatedResearch {
    /// Creates a port with no registered pages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a page to serve for its URL.
    #[must_use]
    pub fn with_page(mut self, page: WebPage) -> Self {
        self.pages.insert(page.url.clone(), page);
        self
    }

    /// Sets the page budget for research plans.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// A snapshot of the browsing session.
    pub async fn session(&self) -> BrowsingSession {
        self.session.lock().await.clone()
    }

    /// Returns the page and summary to serve for `url`.
    fn load(&self, url: &str) -> (WebPage, String) {
        match self.pages.get(url) {
            Some(page) => (page.clone(), page.summary(500)),
            None => {
                let page = WebPage::new(
                    url,
                    format!("Page title for {url}"),
                    format!("This is the content of the page at {url}."),
                )
                .with_link(format!("{url}/link1"), "link1")
                .with_link(format!("{url}/link2"), "link2")
                .with_link(format!("{url}/link3"), "link3");
                let summary = format!("This page at {url} contains information about the topic.");
                (page, summary)
            }
        }
    }

    /// Returns the page reached by following a link labelled `text` to `url`.
    fn load_linked(&self, url: &str, text: &str) -> (WebPage, String) {
        if self.pages.contains_key(url) {
            return self.load(url);
        }
        let page = WebPage::new(
            url,
            format!("Page about {text}"),
            format!("This page contains information about {text}."),
        )
        .with_link(format!("{url}/subpage1"), "subpage1")
        .with_link(format!("{url}/subpage2"), "subpage2");
        let summary = format!("This page is about {text} and contains related information.");
        (page, summary)
    }
}

#[async_trait]
impl ResearchPort for SimulatedResearch {
    async fn navigate(&self, url: &str) -> Result<ActionResult, CapabilityError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(CapabilityError::invalid_input(
                ResearchMethod::Navigate.as_str(),
                "url cannot be empty",
            ));
        }
        let (page, summary) = self.load(url);
        let mut session = self.session.lock().await;
        let mark = session.mark();
        session.visit(page);
        Ok(session.observe(ResearchMethod::Navigate, &summary, mark))
    }

    async fn search(&self, query: &str) -> Result<ActionResult, CapabilityError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CapabilityError::invalid_input(
                ResearchMethod::Search.as_str(),
                "query cannot be empty",
            ));
        }
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let summary = format!(
            "Top results for '{query}':\n1. Result 1\n2. Result 2\n3. Result 3"
        );
        let page = WebPage::new(
            format!("https://www.google.com/search?q={encoded}"),
            format!("Search results for {query}"),
            summary.clone(),
        )
        .with_link(format!("https://example.com/result1?q={encoded}"), "Result 1")
        .with_link(format!("https://example.com/result2?q={encoded}"), "Result 2");

        let mut session = self.session.lock().await;
        let mark = session.mark();
        session.visit(page);
        Ok(session.observe(ResearchMethod::Search, &summary, mark))
    }

    async fn extract_info(&self, selector: &str) -> Result<ActionResult, CapabilityError> {
        let session = self.session.lock().await;
        let Some(page) = session.current() else {
            return Ok(session.decline(
                ResearchMethod::ExtractInfo,
                "No current page to extract from",
            ));
        };
        let lines = page.matching_lines(selector);
        let extracted = if lines.is_empty() {
            format!("Information matching '{}': Sample extracted data.", selector.trim())
        } else {
            lines.join("\n")
        };
        Ok(session.observe(ResearchMethod::ExtractInfo, &extracted, session.mark()))
    }

    async fn follow_link(&self, link_text: &str) -> Result<ActionResult, CapabilityError> {
        let mut session = self.session.lock().await;
        let Some(page) = session.current() else {
            return Ok(session.decline(
                ResearchMethod::FollowLink,
                "No current page to navigate from",
            ));
        };
        let text = link_text.trim();
        let url = page.find_link(text).map_or_else(
            || format!("https://example.com/{}", text.to_lowercase().replace(' ', "-")),
            |link| link.url.clone(),
        );
        let (next, summary) = self.load_linked(&url, text);
        let mark = session.mark();
        session.visit(next);
        Ok(session.observe(ResearchMethod::FollowLink, &summary, mark))
    }

    async fn execute_research_plan(&self, plan: &str) -> Result<ActionResult, CapabilityError> {
        self.execute_plan_with_budget(plan, self.max_pages).await
    }

    async fn current_url(&self) -> Option<String> {
        self.session.lock().await.current_url()
    }

    async fn replay_cached(&self, result: &ActionResult) {
        self.session.lock().await.replay(result);
    }
}

impl ResearchExtensions for SimulatedResearch {}
