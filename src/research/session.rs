//! Browsing session state shared by the research variants.

use super::ResearchMethod;
use crate::action::ActionResult;
use crate::capability::CapabilityError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A hyperlink found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    /// Absolute target URL
    pub url: String,
    /// Anchor text, whitespace-collapsed
    pub text: String,
}

impl PageLink {
    /// Creates a link.
    #[must_use]
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
        }
    }

    /// True if `needle` appears in the anchor text or the URL, ignoring case.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.text.to_lowercase().contains(&needle) || self.url.to_lowercase().contains(&needle)
    }
}

/// A page the session has loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPage {
    /// Final URL of the page
    pub url: String,
    /// Document title
    pub title: String,
    /// Readable text content, one block per line
    pub content: String,
    /// Links in document order
    #[serde(default)]
    pub links: Vec<PageLink>,
}

impl WebPage {
    /// Creates a page with no links.
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            links: Vec::new(),
        }
    }

    /// Replaces the link list.
    #[must_use]
    pub fn with_links(mut self, links: Vec<PageLink>) -> Self {
        self.links = links;
        self
    }

    /// Appends one link.
    #[must_use]
    pub fn with_link(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.links.push(PageLink::new(url, text));
        self
    }

    /// First link whose text or URL contains `needle`.
    #[must_use]
    pub fn find_link(&self, needle: &str) -> Option<&PageLink> {
        self.links.iter().find(|link| link.matches(needle))
    }

    /// Content lines relevant to `selector`, best matches first.
    ///
    /// A line containing the whole selector ranks above lines that only
    /// contain some of its words. Ties keep document order.
    #[must_use]
    pub fn matching_lines(&self, selector: &str) -> Vec<&str> {
        let phrase = selector.trim().to_lowercase();
        if phrase.is_empty() {
            return Vec::new();
        }
        let words: Vec<&str> = phrase.split_whitespace().filter(|w| w.len() > 2).collect();

        let mut scored: Vec<(usize, usize, &str)> = self
            .content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .filter_map(|(index, line)| {
                let lower = line.to_lowercase();
                let score = if lower.contains(&phrase) {
                    words.len() + 1
                } else {
                    words.iter().filter(|w| lower.contains(*w)).count()
                };
                (score > 0).then_some((score, index, line))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, _, line)| line).collect()
    }

    /// First `max_chars` characters of the content, cut at a line break when possible.
    #[must_use]
    pub fn summary(&self, max_chars: usize) -> String {
        if self.content.chars().count() <= max_chars {
            return self.content.clone();
        }
        let cut: String = self.content.chars().take(max_chars).collect();
        match cut.rfind('\n') {
            Some(pos) if pos > 0 => format!("{}\n...", &cut[..pos]),
            _ => format!("{cut}..."),
        }
    }
}

/// Current page plus the ordered list of every page visited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsingSession {
    current: Option<WebPage>,
    visited: Vec<String>,
}

impl BrowsingSession {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The page the session is on.
    #[must_use]
    pub fn current(&self) -> Option<&WebPage> {
        self.current.as_ref()
    }

    /// URL of the current page.
    #[must_use]
    pub fn current_url(&self) -> Option<String> {
        self.current.as_ref().map(|p| p.url.clone())
    }

    /// Every URL visited, in order. Revisits appear again.
    #[must_use]
    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    /// Position in the visit list; pass it to [`observe`](Self::observe) to
    /// report the pages a call added.
    #[must_use]
    pub fn mark(&self) -> usize {
        self.visited.len()
    }

    /// Loads `page` as the current page.
    pub fn visit(&mut self, page: WebPage) {
        self.visited.push(page.url.clone());
        self.current = Some(page);
    }

    /// Builds a successful result for `method` from the session state.
    #[must_use]
    pub fn observe(&self, method: ResearchMethod, extracted: &str, mark: usize) -> ActionResult {
        let output = render_observation(
            Ok(extracted),
            self.current_url().as_deref(),
            &self.visited,
        );
        ActionResult::success(method.source(), output).with_data(self.data(extracted, mark))
    }

    /// Builds a `success = false` result that is an answer, not an error.
    #[must_use]
    pub fn decline(&self, method: ResearchMethod, reason: &str) -> ActionResult {
        let error = CapabilityError::failure(method.as_str(), reason);
        let output = render_observation(
            Err(reason),
            self.current_url().as_deref(),
            &self.visited,
        );
        ActionResult::failure(method.source(), output, Some(error))
            .with_data(self.data("", self.visited.len()))
    }

    /// Applies the page changes recorded in a result produced earlier.
    ///
    /// Cached results skip the port, so the session would otherwise stay on
    /// the page it was on before the cached call.
    pub fn replay(&mut self, result: &ActionResult) {
        if let Some(pages) = result.data.get("new_pages").and_then(Value::as_array) {
            self.visited
                .extend(pages.iter().filter_map(Value::as_str).map(str::to_string));
        }
        if let Some(page) = result
            .data
            .get("current_page")
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value::<WebPage>(v.clone()).ok())
        {
            self.current = Some(page);
        }
    }

    fn data(&self, extracted: &str, mark: usize) -> Value {
        json!({
            "extracted_info": extracted,
            "current_page": self.current,
            "pages_visited": self.visited,
            "new_pages": self.visited.get(mark..).unwrap_or_default(),
        })
    }
}

/// Renders the observation text the model sees for a research call.
///
/// `outcome` is the extracted text on success or the failure reason.
#[must_use]
pub fn render_observation(
    outcome: Result<&str, &str>,
    current_url: Option<&str>,
    visited: &[String],
) -> String {
    let mut obs = String::from("Research Observation: ");
    match outcome {
        Ok(findings) => {
            obs.push_str("Research task completed successfully.\n");
            if !findings.trim().is_empty() {
                obs.push_str(&format!("Findings:\n{}\n", findings.trim()));
            }
        }
        Err(reason) => obs.push_str(&format!("Research task failed: {reason}\n")),
    }
    if let Some(url) = current_url {
        obs.push_str(&format!("Current page: {url}\n"));
    }
    if !visited.is_empty() {
        obs.push_str(&format!("Pages visited: {}", visited.join(", ")));
    }
    obs.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> WebPage {
        WebPage::new(
            "https://example.com",
            "Example",
            "Quantum computing basics\nQubits and gates\nError correction in quantum computing\nContact us",
        )
        .with_link("https://example.com/about", "About Us")
        .with_link("https://example.com/qubits", "Read about qubits")
    }

    #[test]
    fn matching_lines_prefers_whole_phrase() {
        let page = page();
        let lines = page.matching_lines("quantum computing");
        assert_eq!(
            lines,
            vec![
                "Quantum computing basics",
                "Error correction in quantum computing"
            ]
        );
        assert!(page.matching_lines("   ").is_empty());
        assert!(page.matching_lines("blockchain").is_empty());
    }

    #[test]
    fn matching_lines_scores_partial_words() {
        let page = page();
        let lines = page.matching_lines("qubits error");
        assert_eq!(lines, vec!["Qubits and gates", "Error correction in quantum computing"]);
    }

    #[test]
    fn find_link_is_case_insensitive() {
        let page = page();
        assert_eq!(
            page.find_link("about us").map(|l| l.url.as_str()),
            Some("https://example.com/about")
        );
        assert_eq!(
            page.find_link("QUBITS").map(|l| l.url.as_str()),
            Some("https://example.com/qubits")
        );
        assert!(page.find_link("pricing").is_none());
    }

    #[test]
    fn summary_cuts_long_content() {
        let page = page();
        assert_eq!(page.summary(1000), page.content);
        assert_eq!(page.summary(30), "Quantum computing basics\n...");
    }

    #[test]
    fn visit_updates_current_and_history() {
        let mut session = BrowsingSession::new();
        assert!(session.current().is_none());
        session.visit(page());
        session.visit(WebPage::new("https://b.example", "B", ""));
        assert_eq!(session.current_url().as_deref(), Some("https://b.example"));
        assert_eq!(session.visited(), ["https://example.com", "https://b.example"]);
    }

    #[test]
    fn observe_renders_findings_and_pages() {
        let mut session = BrowsingSession::new();
        let mark = session.mark();
        session.visit(page());
        let result = session.observe(ResearchMethod::Navigate, "A summary", mark);

        assert!(result.success);
        assert_eq!(
            result.output,
            "Research Observation: Research task completed successfully.\n\
             Findings:\nA summary\n\
             Current page: https://example.com\n\
             Pages visited: https://example.com"
        );
        assert_eq!(result.data["new_pages"], json!(["https://example.com"]));
    }

    #[test]
    fn decline_is_a_failed_answer() {
        let session = BrowsingSession::new();
        let result = session.decline(ResearchMethod::ExtractInfo, "No current page to extract from");
        assert!(!result.success);
        assert_eq!(
            result.output,
            "Research Observation: Research task failed: No current page to extract from"
        );
        assert!(result.error.is_some());
    }

    #[test]
    fn replay_restores_page_state() {
        let mut original = BrowsingSession::new();
        let mark = original.mark();
        original.visit(page());
        let result = original.observe(ResearchMethod::Navigate, "", mark);

        let mut fresh = BrowsingSession::new();
        fresh.replay(&result);
        assert_eq!(fresh.current(), original.current());
        assert_eq!(fresh.visited(), original.visited());
    }
}
