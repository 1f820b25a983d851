//! HTTP-backed research port.
//!
//! Pages are fetched with `reqwest` and reduced to title, readable text and
//! links with a handful of regular expressions. There is no script execution
//! or DOM; what the server sends is what the agent sees.

use super::{
    BrowsingSession, PageLink, ResearchExtensions, ResearchMethod, ResearchPort, WebPage,
};
use crate::action::ActionResult;
use crate::capability::CapabilityError;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Default HTML search endpoint; `{query}` is replaced by the encoded query.
pub const DEFAULT_SEARCH_URL: &str = "https://html.duckduckgo.com/html/?q={query}";

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("codeact/", env!("CARGO_PKG_VERSION"));

const MAX_SEARCH_RESULTS: usize = 10;
const MAX_EXTRACTED_LINES: usize = 10;
const SUMMARY_CHARS: usize = 1500;

/// Settings for [`WebResearch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResearchConfig {
    /// Search endpoint template containing `{query}`
    pub search_url: String,
    /// `User-Agent` header sent with every request
    pub user_agent: String,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Maximum response body size in bytes
    pub max_response_size: usize,
    /// Page budget for research plans
    pub max_pages: u32,
}

impl Default for WebResearchConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
            max_response_size: 2 * 1024 * 1024, // 2MB
            max_pages: super::DEFAULT_MAX_PAGES,
        }
    }
}

/// Research port that browses the live web.
#[derive(Debug)]
pub struct WebResearch {
    client: reqwest::Client,
    config: WebResearchConfig,
    session: Mutex<BrowsingSession>,
}

impl WebResearch {
    /// Creates a port with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, CapabilityError> {
        Self::with_config(WebResearchConfig::default())
    }

    /// Creates a port with custom settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_config(config: WebResearchConfig) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| {
                CapabilityError::failure("http_client", format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            session: Mutex::new(BrowsingSession::new()),
        })
    }

    /// The active settings.
    #[must_use]
    pub fn config(&self) -> &WebResearchConfig {
        &self.config
    }

    /// Builds the search URL for `query`.
    #[must_use]
    pub fn search_url_for(&self, query: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        if self.config.search_url.contains("{query}") {
            self.config.search_url.replace("{query}", &encoded)
        } else {
            format!("{}{encoded}", self.config.search_url)
        }
    }

    /// Validates and normalizes the URL.
    fn validate_url(method: ResearchMethod, url: &str) -> Result<Url, CapabilityError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(CapabilityError::invalid_input(method.as_str(), "url cannot be empty"));
        }

        let parsed = Url::parse(url).map_err(|e| {
            CapabilityError::invalid_input(method.as_str(), format!("invalid URL: {e}"))
        })?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(CapabilityError::invalid_input(
                    method.as_str(),
                    format!("unsupported URL scheme: {scheme}; only http and https are allowed"),
                ));
            }
        }

        if let Some(host) = parsed.host_str() {
            let is_local = host == "localhost"
                || host == "127.0.0.1"
                || host == "[::1]"
                || host.starts_with("192.168.")
                || host.starts_with("10.")
                || (16..=31).any(|n| host.starts_with(&format!("172.{n}.")));

            if is_local {
                return Err(CapabilityError::invalid_input(
                    method.as_str(),
                    "cannot fetch from localhost or private IP addresses",
                ));
            }
        }

        Ok(parsed)
    }

    /// Fetches and parses one page.
    async fn fetch(&self, method: ResearchMethod, url: &Url) -> Result<WebPage, CapabilityError> {
        tracing::debug!(%method, %url, "fetching page");
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                CapabilityError::timeout(method.as_str(), self.config.request_timeout)
            } else if e.is_connect() {
                CapabilityError::failure(method.as_str(), format!("connection failed: {e}"))
            } else {
                CapabilityError::failure(method.as_str(), format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::failure(
                method.as_str(),
                format!("HTTP {status} from {url}"),
            ));
        }
        let final_url = response.url().clone();

        let bytes = response.bytes().await.map_err(|e| {
            CapabilityError::failure(method.as_str(), format!("failed to read response: {e}"))
        })?;
        let limit = bytes.len().min(self.config.max_response_size);
        let body = String::from_utf8_lossy(&bytes[..limit]);

        Ok(parse_html(&final_url, &body))
    }
}

#[async_trait]
impl ResearchPort for WebResearch {
    async fn navigate(&self, url: &str) -> Result<ActionResult, CapabilityError> {
        let method = ResearchMethod::Navigate;
        let url = Self::validate_url(method, url)?;
        let page = self.fetch(method, &url).await?;
        let summary = format!("{}\n\n{}", page.title, page.summary(SUMMARY_CHARS));

        let mut session = self.session.lock().await;
        let mark = session.mark();
        session.visit(page);
        Ok(session.observe(method, summary.trim(), mark))
    }

    async fn search(&self, query: &str) -> Result<ActionResult, CapabilityError> {
        let method = ResearchMethod::Search;
        let query = query.trim();
        if query.is_empty() {
            return Err(CapabilityError::invalid_input(method.as_str(), "query cannot be empty"));
        }
        let url = Self::validate_url(method, &self.search_url_for(query))?;
        let fetched = self.fetch(method, &url).await?;

        let engine_host = url.host_str().unwrap_or_default().to_string();
        let mut results: Vec<PageLink> = Vec::new();
        for link in fetched.links {
            let external = Url::parse(&link.url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .is_some_and(|host| !host.ends_with(&engine_host) && !engine_host.ends_with(&host));
            if external && !link.text.is_empty() && !results.iter().any(|r| r.url == link.url) {
                results.push(link);
            }
            if results.len() == MAX_SEARCH_RESULTS {
                break;
            }
        }

        let summary = if results.is_empty() {
            format!("No results found for '{query}'.")
        } else {
            let listed = results
                .iter()
                .enumerate()
                .map(|(i, r)| format!("{}. {}\n   {}", i + 1, r.text, r.url))
                .collect::<Vec<_>>()
                .join("\n");
            format!("Top results for '{query}':\n{listed}")
        };
        let page = WebPage::new(url.as_str(), format!("Search results for {query}"), summary.clone())
            .with_links(results);

        let mut session = self.session.lock().await;
        let mark = session.mark();
        session.visit(page);
        Ok(session.observe(method, &summary, mark))
    }

    async fn extract_info(&self, selector: &str) -> Result<ActionResult, CapabilityError> {
        let method = ResearchMethod::ExtractInfo;
        let session = self.session.lock().await;
        let Some(page) = session.current() else {
            return Ok(session.decline(method, "No current page to extract from"));
        };
        let lines = page.matching_lines(selector);
        if lines.is_empty() {
            let reason = format!("Nothing on {} matched '{}'", page.url, selector.trim());
            return Ok(session.decline(method, &reason));
        }
        let extracted = lines
            .into_iter()
            .take(MAX_EXTRACTED_LINES)
            .collect::<Vec<_>>()
            .join("\n");
        Ok(session.observe(method, &extracted, session.mark()))
    }

    async fn follow_link(&self, link_text: &str) -> Result<ActionResult, CapabilityError> {
        let method = ResearchMethod::FollowLink;
        let target = {
            let session = self.session.lock().await;
            let Some(page) = session.current() else {
                return Ok(session.decline(method, "No current page to navigate from"));
            };
            match page.find_link(link_text.trim()) {
                Some(link) => link.url.clone(),
                None => {
                    let reason = format!(
                        "No link containing '{}' on {}",
                        link_text.trim(),
                        page.url
                    );
                    return Ok(session.decline(method, &reason));
                }
            }
        };

        let url = Self::validate_url(method, &target)?;
        let page = self.fetch(method, &url).await?;
        let summary = format!("{}\n\n{}", page.title, page.summary(SUMMARY_CHARS));

        let mut session = self.session.lock().await;
        let mark = session.mark();
        session.visit(page);
        Ok(session.observe(method, summary.trim(), mark))
    }

    async fn execute_research_plan(&self, plan: &str) -> Result<ActionResult, CapabilityError> {
        self.execute_plan_with_budget(plan, self.config.max_pages).await
    }

    async fn current_url(&self) -> Option<String> {
        self.session.lock().await.current_url()
    }

    async fn replay_cached(&self, result: &ActionResult) {
        self.session.lock().await.replay(result);
    }
}

impl ResearchExtensions for WebResearch {}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid regex"))
}

/// Reduces an HTML document to a [`WebPage`].
#[must_use]
pub fn parse_html(base: &Url, html: &str) -> WebPage {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    static LINK: OnceLock<Regex> = OnceLock::new();

    let title = regex(&TITLE, r"(?is)<title[^>]*>(.*?)</title>")
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| collapse(&decode_entities(&strip_tags(m.as_str()))))
        .unwrap_or_default();

    let body = strip_invisible(html);

    let mut links = Vec::new();
    for caps in regex(
        &LINK,
        r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#,
    )
    .captures_iter(&body)
    {
        let (Some(href), Some(inner)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let href = decode_entities(href.as_str().trim());
        if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
            continue;
        }
        let Ok(target) = base.join(&href) else {
            continue;
        };
        let target = unwrap_redirect(&target).unwrap_or(target);
        let text = collapse(&decode_entities(&strip_tags(inner.as_str())));
        links.push(PageLink::new(target.as_str(), text));
    }

    WebPage::new(base.as_str(), title, readable_text(&body)).with_links(links)
}

/// Removes elements whose content is never shown.
fn strip_invisible(html: &str) -> String {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static STYLE: OnceLock<Regex> = OnceLock::new();
    static NOSCRIPT: OnceLock<Regex> = OnceLock::new();
    static HEAD: OnceLock<Regex> = OnceLock::new();
    static COMMENT: OnceLock<Regex> = OnceLock::new();

    let mut out = html.to_string();
    for re in [
        regex(&COMMENT, r"(?s)<!--.*?-->"),
        regex(&HEAD, r"(?is)<head\b.*?</head>"),
        regex(&SCRIPT, r"(?is)<script\b.*?</script>"),
        regex(&STYLE, r"(?is)<style\b.*?</style>"),
        regex(&NOSCRIPT, r"(?is)<noscript\b.*?</noscript>"),
    ] {
        out = re.replace_all(&out, " ").into_owned();
    }
    out
}

fn strip_tags(html: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    regex(&TAG, r"(?s)<[^>]*>").replace_all(html, " ").into_owned()
}

/// Converts markup to one block of text per line.
fn readable_text(html: &str) -> String {
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    let with_breaks = regex(
        &BLOCK,
        r"(?i)<\s*/?\s*(?:p|div|br|li|ul|ol|tr|table|section|article|header|footer|h[1-6])\b[^>]*>",
    )
    .replace_all(html, "\n");
    let text = decode_entities(&strip_tags(&with_breaks));
    text.lines()
        .map(collapse)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Resolves search-engine redirect links (`/l/?uddg=<target>`) to their target.
fn unwrap_redirect(url: &Url) -> Option<Url> {
    url.query_pairs()
        .find(|(key, _)| key == "uddg")
        .and_then(|(_, target)| Url::parse(&target).ok())
}
