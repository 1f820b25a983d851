//! Parsed action requests and capability results.
//!
//! An [`ActionRequest`] is what the parser recognised in one model output; an
//! [`ActionResult`] is what a capability produced when a request was dispatched.

use crate::capability::CapabilityError;
use crate::research::ResearchMethod;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The kinds of tagged regions the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Model reasoning; informational only, never dispatched
    Thought,
    /// Code to run through the execution port
    Code,
    /// A natural-language research plan
    Research,
    /// A web search query
    Search,
    /// A URL to open
    Navigate,
    /// No executable tag was found; the payload is the whole output
    None,
}

impl ActionKind {
    /// Every kind that is written as a tag, in grammar order.
    pub const TAGGED: [ActionKind; 5] = [
        ActionKind::Thought,
        ActionKind::Code,
        ActionKind::Research,
        ActionKind::Search,
        ActionKind::Navigate,
    ];

    /// Resolves a tag name to its kind. Matching is case-sensitive.
    ///
    /// `execute` is accepted as an older spelling of `code`.
    #[must_use]
    pub fn from_tag(name: &str) -> Option<Self> {
        match name {
            "thought" => Some(Self::Thought),
            "code" | "execute" => Some(Self::Code),
            "research" => Some(Self::Research),
            "search" => Some(Self::Search),
            "navigate" => Some(Self::Navigate),
            _ => None,
        }
    }

    /// The canonical tag name for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thought => "thought",
            Self::Code => "code",
            Self::Research => "research",
            Self::Search => "search",
            Self::Navigate => "navigate",
            Self::None => "none",
        }
    }

    /// True for kinds that can be dispatched to a capability.
    #[must_use]
    pub fn is_executable(self) -> bool {
        matches!(
            self,
            Self::Code | Self::Research | Self::Search | Self::Navigate
        )
    }

    /// True for kinds served by the research port.
    #[must_use]
    pub fn is_research_family(self) -> bool {
        matches!(self, Self::Research | Self::Search | Self::Navigate)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instruction recognised in model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// What kind of action this is
    pub kind: ActionKind,
    /// The trimmed text between the tags
    pub payload: String,
    /// The exact substring of the model output, tags included
    pub raw_span: String,
}

impl ActionRequest {
    /// Creates a new action request.
    #[must_use]
    pub fn new(kind: ActionKind, payload: impl Into<String>, raw_span: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            raw_span: raw_span.into(),
        }
    }

    /// Creates the `none` request carrying the whole output for display.
    #[must_use]
    pub fn none(text: &str) -> Self {
        Self::new(ActionKind::None, text.trim(), text)
    }
}

/// Which capability produced an [`ActionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "capability", content = "method", rename_all = "snake_case")]
pub enum CapabilitySource {
    /// The code execution port
    Execution,
    /// The research port, with the method that was called
    Research(ResearchMethod),
}

impl fmt::Display for CapabilitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execution => f.write_str("execution"),
            Self::Research(method) => write!(f, "research.{}", method),
        }
    }
}

/// The outcome of one capability call.
///
/// `output` is always populated; on failure it carries an explicit
/// explanation so callers never see an empty observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the capability reported success
    pub success: bool,
    /// Rendered observation text, appended verbatim as the tool turn
    pub output: String,
    /// Structured detail (pages visited, exit status, ...)
    #[serde(default)]
    pub data: Value,
    /// Error descriptor when `success` is false
    #[serde(default)]
    pub error: Option<CapabilityError>,
    /// The capability that produced this result
    pub source: CapabilitySource,
}

impl ActionResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(source: CapabilitySource, output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            data: Value::Null,
            error: None,
            source,
        }
    }

    /// Creates a failed result that still carries an observation.
    #[must_use]
    pub fn failure(
        source: CapabilitySource,
        output: impl Into<String>,
        error: Option<CapabilityError>,
    ) -> Self {
        Self {
            success: false,
            output: output.into(),
            data: Value::Null,
            error,
            source,
        }
    }

    /// Attaches structured data.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Returns true if this result is a degraded fallback produced after retries.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.data
            .get("degraded")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tag_is_case_sensitive() {
        assert_eq!(ActionKind::from_tag("code"), Some(ActionKind::Code));
        assert_eq!(ActionKind::from_tag("Code"), None);
        assert_eq!(ActionKind::from_tag("SEARCH"), None);
    }

    #[test]
    fn execute_is_an_alias_for_code() {
        assert_eq!(ActionKind::from_tag("execute"), Some(ActionKind::Code));
    }

    #[test]
    fn none_is_not_a_tag() {
        assert_eq!(ActionKind::from_tag("none"), None);
        assert!(!ActionKind::TAGGED.contains(&ActionKind::None));
    }

    #[test]
    fn thought_is_never_executable() {
        assert!(!ActionKind::Thought.is_executable());
        assert!(!ActionKind::None.is_executable());
        assert!(ActionKind::Code.is_executable());
        assert!(!ActionKind::Code.is_research_family());
        for kind in [ActionKind::Research, ActionKind::Search, ActionKind::Navigate] {
            assert!(kind.is_executable());
            assert!(kind.is_research_family());
        }
    }

    #[test]
    fn none_request_keeps_full_text() {
        let request = ActionRequest::none("  just chatting  ");
        assert_eq!(request.kind, ActionKind::None);
        assert_eq!(request.payload, "just chatting");
        assert_eq!(request.raw_span, "  just chatting  ");
    }

    #[test]
    fn source_display() {
        assert_eq!(CapabilitySource::Execution.to_string(), "execution");
        assert_eq!(
            CapabilitySource::Research(ResearchMethod::Search).to_string(),
            "research.search"
        );
    }

    #[test]
    fn degraded_flag_reads_from_data() {
        let plain = ActionResult::success(CapabilitySource::Execution, "ok");
        assert!(!plain.is_degraded());

        let degraded = ActionResult::failure(
            CapabilitySource::Research(ResearchMethod::Navigate),
            "fallback",
            None,
        )
        .with_data(serde_json::json!({ "degraded": true }));
        assert!(degraded.is_degraded());
    }
}
