//! Deterministic decomposition of natural-language research plans.
//!
//! A plan is split into lines; each non-empty line becomes one [`PlanStep`]:
//!
//! - a line containing a URL navigates to the first URL on it;
//! - `follow …` / `click …` follows a link on the current page;
//! - `extract …` pulls matching text from the current page;
//! - anything else is searched for, minus a leading verb such as
//!   `search for` or `find`.
//!
//! List markers (`1.`, `2)`, `-`, `*`) are stripped first. The same plan text
//! always yields the same steps.

use super::{render_observation, ResearchMethod, ResearchPort};
use crate::action::ActionResult;
use crate::capability::CapabilityError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::OnceLock;

/// Page budget for a plan when none is configured.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// One executable step of a research plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "argument", rename_all = "snake_case")]
pub enum PlanStep {
    /// Open a URL
    Navigate(String),
    /// Run a search query
    Search(String),
    /// Extract text from the current page
    ExtractInfo(String),
    /// Follow a link on the current page
    FollowLink(String),
}

impl PlanStep {
    /// The port method this step calls.
    #[must_use]
    pub fn method(&self) -> ResearchMethod {
        match self {
            Self::Navigate(_) => ResearchMethod::Navigate,
            Self::Search(_) => ResearchMethod::Search,
            Self::ExtractInfo(_) => ResearchMethod::ExtractInfo,
            Self::FollowLink(_) => ResearchMethod::FollowLink,
        }
    }

    /// The argument passed to the port.
    #[must_use]
    pub fn argument(&self) -> &str {
        match self {
            Self::Navigate(s) | Self::Search(s) | Self::ExtractInfo(s) | Self::FollowLink(s) => s,
        }
    }

    /// True if running this step loads a page.
    #[must_use]
    pub fn visits_page(&self) -> bool {
        !matches!(self, Self::ExtractInfo(_))
    }

    async fn run<P: ResearchPort + ?Sized>(
        &self,
        port: &P,
    ) -> Result<ActionResult, CapabilityError> {
        match self {
            Self::Navigate(url) => port.navigate(url).await,
            Self::Search(query) => port.search(query).await,
            Self::ExtractInfo(selector) => port.extract_info(selector).await,
            Self::FollowLink(text) => port.follow_link(text).await,
        }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.method(), self.argument())
    }
}

/// An ordered list of plan steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchPlan {
    steps: Vec<PlanStep>,
}

fn list_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:\d+[.)]|[-*•]|step\s+\d+:)\s*").expect("valid regex"))
}

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"'()\[\]]+"#).expect("valid regex"))
}

const SEARCH_VERBS: [&str; 7] = [
    "search for ",
    "search ",
    "look up ",
    "look for ",
    "find out ",
    "find ",
    "research ",
];
const FOLLOW_VERBS: [&str; 3] = ["follow ", "click on ", "click "];
const EXTRACT_VERBS: [&str; 2] = ["extract ", "pull out "];
const LINK_FILLERS: [&str; 5] = [
    "a link containing ",
    "the link to ",
    "the link ",
    "link to ",
    "link ",
];
const EXTRACT_FILLERS: [&str; 3] = ["information about ", "information on ", "info on "];

/// Strips a case-insensitive prefix from `text`, returning the remainder.
fn strip_any<'a>(text: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|prefix| {
        text.get(..prefix.len())
            .filter(|head| head.eq_ignore_ascii_case(prefix))
            .map(|_| &text[prefix.len()..])
    })
}

fn clean(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', ';', ','])
        .trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
        .to_string()
}

impl ResearchPlan {
    /// Decomposes `text` into steps.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let steps = text.lines().filter_map(Self::parse_line).collect();
        Self { steps }
    }

    fn parse_line(line: &str) -> Option<PlanStep> {
        let line = list_marker().replace(line, "");
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(url) = url_pattern().find(line) {
            let url = url.as_str().trim_end_matches(['.', ',', ';', ':']);
            return Some(PlanStep::Navigate(url.to_string()));
        }
        if let Some(rest) = strip_any(line, &FOLLOW_VERBS) {
            let rest = strip_any(rest, &LINK_FILLERS).unwrap_or(rest);
            return Some(PlanStep::FollowLink(clean(rest))).filter(|s| !s.argument().is_empty());
        }
        if let Some(rest) = strip_any(line, &EXTRACT_VERBS) {
            let rest = strip_any(rest, &EXTRACT_FILLERS).unwrap_or(rest);
            return Some(PlanStep::ExtractInfo(clean(rest))).filter(|s| !s.argument().is_empty());
        }
        let query = strip_any(line, &SEARCH_VERBS).unwrap_or(line);
        Some(PlanStep::Search(clean(query))).filter(|s| !s.argument().is_empty())
    }

    /// The steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// True if no line produced a step.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs the plan against `port`, visiting at most `max_pages` pages.
    ///
    /// Steps run strictly in order. A step that would load a page beyond the
    /// budget is not started; the plan stops there and reports a partial
    /// result with `success = false` and a budget-exhausted error. A step
    /// answering `success = false` is recorded and the plan carries on.
    ///
    /// # Errors
    ///
    /// Propagates the first `Err` raised by a step.
    pub async fn run<P: ResearchPort + ?Sized>(
        &self,
        port: &P,
        max_pages: u32,
    ) -> Result<ActionResult, CapabilityError> {
        let method = ResearchMethod::ExecutePlan;
        if self.is_empty() {
            return Ok(ActionResult::failure(
                method.source(),
                render_observation(Err("the research plan contained no actionable steps"), None, &[]),
                Some(CapabilityError::invalid_input(
                    method.as_str(),
                    "no actionable steps",
                )),
            ));
        }

        let mut pages = 0u32;
        let mut findings = Vec::with_capacity(self.steps.len());
        let mut visited: Vec<String> = Vec::new();
        let mut last_page = serde_json::Value::Null;
        let mut stopped = None;

        for (index, step) in self.steps.iter().enumerate() {
            if step.visits_page() && pages >= max_pages {
                tracing::warn!(
                    step = index + 1,
                    max_pages,
                    "research plan stopped at page budget"
                );
                stopped = Some(index);
                break;
            }
            tracing::debug!(step = index + 1, %step, "running plan step");
            let result = step.run(port).await?;
            if step.visits_page() {
                pages += 1;
            }
            if let Some(pages) = result.data.get("new_pages").and_then(|v| v.as_array()) {
                visited.extend(pages.iter().filter_map(|p| p.as_str()).map(str::to_string));
            }
            if let Some(page) = result.data.get("current_page").filter(|v| !v.is_null()) {
                last_page = page.clone();
            }
            let detail = result
                .data
                .get("extracted_info")
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map_or_else(|| result.output.clone(), str::to_string);
            let status = if result.success { "" } else { " (failed)" };
            findings.push(format!("Step {}: {step}{status}\n{}", index + 1, detail.trim()));
        }

        let current = port.current_url().await;
        let completed = stopped.unwrap_or(self.steps.len());
        let data = json!({
            "steps": self.steps,
            "steps_completed": completed,
            "pages_used": pages,
            "new_pages": visited,
            "current_page": last_page,
            "extracted_info": findings.join("\n\n"),
        });

        let result = match stopped {
            None => ActionResult::success(
                method.source(),
                render_observation(Ok(&findings.join("\n\n")), current.as_deref(), &visited),
            ),
            Some(_) => {
                let error = CapabilityError::budget_exhausted(max_pages, "pages");
                let reason = format!(
                    "{error}; completed {completed} of {} steps\nPartial findings:\n{}",
                    self.steps.len(),
                    findings.join("\n\n")
                );
                ActionResult::failure(
                    method.source(),
                    render_observation(Err(reason.trim()), current.as_deref(), &visited),
                    Some(error),
                )
            }
        };
        Ok(result.with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::SimulatedResearch;

    #[test]
    fn decomposes_numbered_plan() {
        let plan = ResearchPlan::parse(
            "1. Search for quantum supremacy\n\
             2. Navigate to https://arxiv.org/list/quant-ph.\n\
             3. Follow the link 'Recent'\n\
             4. Extract information about error correction\n\
             5) find applications in cryptography",
        );
        assert_eq!(
            plan.steps(),
            &[
                PlanStep::Search("quantum supremacy".into()),
                PlanStep::Navigate("https://arxiv.org/list/quant-ph".into()),
                PlanStep::FollowLink("Recent".into()),
                PlanStep::ExtractInfo("error correction".into()),
                PlanStep::Search("applications in cryptography".into()),
            ]
        );
    }

    #[test]
    fn bare_lines_become_searches() {
        let plan = ResearchPlan::parse("- latest rust release\n\n* tokio changelog");
        assert_eq!(
            plan.steps(),
            &[
                PlanStep::Search("latest rust release".into()),
                PlanStep::Search("tokio changelog".into()),
            ]
        );
    }

    #[test]
    fn decomposition_is_deterministic() {
        let text = "Search for a\nClick on b\nExtract c";
        assert_eq!(ResearchPlan::parse(text), ResearchPlan::parse(text));
    }

    #[test]
    fn empty_plan_has_no_steps() {
        assert!(ResearchPlan::parse("  \n\n 1. \n").is_empty());
    }

    #[test]
    fn only_extract_steps_skip_page_budget() {
        assert!(PlanStep::Search("q".into()).visits_page());
        assert!(PlanStep::Navigate("u".into()).visits_page());
        assert!(PlanStep::FollowLink("l".into()).visits_page());
        assert!(!PlanStep::ExtractInfo("s".into()).visits_page());
    }

    #[tokio::test]
    async fn run_visits_pages_in_order() {
        let port = SimulatedResearch::new();
        let plan = ResearchPlan::parse("Navigate to https://a.example\nExtract pricing\nSearch for b");
        let result = plan.run(&port, 10).await.unwrap();

        assert!(result.success);
        assert_eq!(result.data["steps_completed"], 3);
        assert_eq!(result.data["pages_used"], 2);
        assert!(result.output.contains("Step 1: navigate \"https://a.example\""));
        assert!(result.output.contains("Step 3: search \"b\""));
    }

    #[tokio::test]
    async fn run_stops_at_page_budget() {
        let port = SimulatedResearch::new();
        let plan = ResearchPlan::parse("Search for a\nExtract a\nSearch for b\nSearch for c");
        let result = plan.run(&port, 2).await.unwrap();

        assert!(!result.success);
        assert!(result.error.as_ref().is_some_and(CapabilityError::is_budget_exhausted));
        assert_eq!(result.data["steps_completed"], 3);
        assert_eq!(result.data["pages_used"], 2);
        assert!(result.output.contains("completed 3 of 4 steps"));
    }

    #[tokio::test]
    async fn run_reports_the_page_it_ended_on() {
        let port = SimulatedResearch::new();
        let plan = ResearchPlan::parse("Navigate to https://a.example\nExtract anything");
        let result = plan.run(&port, 10).await.unwrap();

        assert_eq!(result.data["current_page"]["url"], "https://a.example");
    }

    #[tokio::test]
    async fn run_rejects_empty_plan() {
        let port = SimulatedResearch::new();
        let result = ResearchPlan::parse("").run(&port, 5).await.unwrap();
        assert!(!result.success);
        assert!(result.output.contains("no actionable steps"));
    }
}
