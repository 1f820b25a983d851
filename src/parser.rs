//! Action parser for tagged model output.
//!
//! Model output is free text with embedded regions such as
//! `<search>rust async</search>`. The parser walks the text once, left to
//! right, and splits it into typed [`ActionRequest`]s and leftover prose.
//!
//! The grammar is deliberately permissive:
//!
//! - Tag names are matched case-sensitively (`<Code>` is plain text).
//! - Regions do not nest. The first matching close tag ends a region, so the
//!   payload of `<code>` may contain other tags verbatim.
//! - An open tag without a matching close tag, a stray close tag, or an
//!   unknown tag is kept as plain text. Parsing never fails.
//!
//! `<solution>…</solution>` is the completion marker. It is reported through
//! [`ParsedOutput::solution`] rather than as an action.

use crate::action::{ActionKind, ActionRequest};

/// Tag name of the completion marker.
pub const SOLUTION_TAG: &str = "solution";

/// Longest name looked at after a `<`; nothing longer is a known tag.
const MAX_TAG_NAME: usize = 16;

/// Everything the parser recognised in one model output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedOutput {
    /// Recognised requests in document order
    pub actions: Vec<ActionRequest>,
    /// Text outside any recognised region, trimmed
    pub leftover: String,
    /// Payload of the first completion marker, if any
    pub solution: Option<String>,
}

impl ParsedOutput {
    /// Requests that could be dispatched, in document order.
    pub fn executable(&self) -> impl Iterator<Item = &ActionRequest> {
        self.actions.iter().filter(|a| a.kind.is_executable())
    }

    /// Thought payloads in document order.
    pub fn thoughts(&self) -> impl Iterator<Item = &str> {
        self.actions
            .iter()
            .filter(|a| a.kind == ActionKind::Thought)
            .map(|a| a.payload.as_str())
    }

    /// True if at least one executable request was found.
    #[must_use]
    pub fn has_executable(&self) -> bool {
        self.executable().next().is_some()
    }

    /// True if the output contained any recognised tag at all.
    #[must_use]
    pub fn has_tags(&self) -> bool {
        self.solution.is_some() || self.actions.iter().any(|a| a.kind != ActionKind::None)
    }

    /// Splits into the `(actions, leftover)` pair.
    #[must_use]
    pub fn into_parts(self) -> (Vec<ActionRequest>, String) {
        (self.actions, self.leftover)
    }
}

/// Stateless scanner over the tag grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionParser;

enum Region {
    Action(ActionKind),
    Solution,
}

impl ActionParser {
    /// Creates a parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parses raw model output.
    #[must_use]
    pub fn parse(&self, raw: &str) -> ParsedOutput {
        let mut output = ParsedOutput::default();
        let mut leftover = String::new();
        let mut unclosed: Vec<&str> = Vec::new();
        let mut cursor = 0;

        while let Some(found) = raw[cursor..].find('<') {
            let start = cursor + found;
            leftover.push_str(&raw[cursor..start]);

            match Self::match_region(raw, start, &mut unclosed) {
                Some((region, payload, end)) => {
                    let span = &raw[start..end];
                    match region {
                        Region::Action(kind) => {
                            output
                                .actions
                                .push(ActionRequest::new(kind, payload.trim(), span));
                        }
                        Region::Solution => {
                            if output.solution.is_none() {
                                output.solution = Some(payload.trim().to_string());
                            }
                        }
                    }
                    cursor = end;
                }
                None => {
                    leftover.push('<');
                    cursor = start + 1;
                }
            }
        }
        leftover.push_str(&raw[cursor..]);
        output.leftover = leftover.trim().to_string();

        if !output.has_executable() {
            output.actions.push(ActionRequest::none(raw));
        }

        output
    }

    /// Tries to match a complete region starting at `start` (which points at `<`).
    ///
    /// Returns the region, its inner payload and the byte offset just past the
    /// close tag. Names whose close tag is missing from the rest of the text are
    /// remembered in `unclosed`, so each one is searched for at most once.
    fn match_region<'a>(
        raw: &'a str,
        start: usize,
        unclosed: &mut Vec<&'a str>,
    ) -> Option<(Region, &'a str, usize)> {
        let rest = &raw[start + 1..];
        let name_len = rest
            .bytes()
            .take(MAX_TAG_NAME + 1)
            .position(|b| b == b'>')?;
        let name = &rest[..name_len];
        if unclosed.contains(&name) {
            return None;
        }

        let region = if name == SOLUTION_TAG {
            Region::Solution
        } else if let Some(kind) = ActionKind::from_tag(name) {
            Region::Action(kind)
        } else {
            return None;
        };

        let body_start = start + 1 + name_len + 1;
        let close = format!("</{name}>");
        match raw[body_start..].find(&close) {
            Some(offset) => {
                let body_end = body_start + offset;
                Some((region, &raw[body_start..body_end], body_end + close.len()))
            }
            None => {
                tracing::debug!(tag = %name, "unmatched open tag treated as plain text");
                unclosed.push(name);
                None
            }
        }
    }
}

/// Parses raw model output with the default parser.
#[must_use]
pub fn parse(raw: &str) -> ParsedOutput {
    ActionParser::new().parse(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(parsed: &ParsedOutput) -> Vec<ActionKind> {
        parsed.actions.iter().map(|a| a.kind).collect()
    }

    #[test]
    fn parses_thought_and_search() {
        let parsed = parse(
            "<thought>I need to find information about quantum computing</thought>\n\
             <search>recent advances in quantum computing 2025</search>",
        );

        assert_eq!(kinds(&parsed), vec![ActionKind::Thought, ActionKind::Search]);
        assert_eq!(
            parsed.thoughts().collect::<Vec<_>>(),
            vec!["I need to find information about quantum computing"]
        );
        assert_eq!(
            parsed.actions[1].payload,
            "recent advances in quantum computing 2025"
        );
        assert_eq!(
            parsed.actions[1].raw_span,
            "<search>recent advances in quantum computing 2025</search>"
        );
        assert!(parsed.leftover.is_empty());
    }

    #[test]
    fn research_plan_payload_is_trimmed() {
        let parsed = parse(
            "<research>\n  1. Search for quantum supremacy\n  2. Find applications\n</research>",
        );
        assert_eq!(
            parsed.actions[0].payload,
            "1. Search for quantum supremacy\n  2. Find applications"
        );
    }

    #[test]
    fn keeps_document_order_for_multiple_executable_tags() {
        let parsed = parse(
            "<navigate>https://a.example</navigate> then <search>b</search> and <code>print(1)</code>",
        );
        assert_eq!(
            kinds(&parsed),
            vec![ActionKind::Navigate, ActionKind::Search, ActionKind::Code]
        );
        assert_eq!(parsed.leftover, "then  and");
    }

    #[test]
    fn unmatched_open_tag_is_plain_text() {
        let parsed = parse("<code>print('never closed')");
        assert_eq!(kinds(&parsed), vec![ActionKind::None]);
        assert_eq!(parsed.leftover, "<code>print('never closed')");
        assert_eq!(parsed.actions[0].payload, "<code>print('never closed')");
    }

    #[test]
    fn stray_close_tag_is_plain_text() {
        let parsed = parse("done </search> here");
        assert_eq!(kinds(&parsed), vec![ActionKind::None]);
        assert_eq!(parsed.leftover, "done </search> here");
    }

    #[test]
    fn tags_are_case_sensitive() {
        let parsed = parse("<Search>rust</Search>");
        assert!(!parsed.has_executable());
        assert!(!parsed.has_tags());
        assert_eq!(parsed.leftover, "<Search>rust</Search>");
    }

    #[test]
    fn unknown_tags_stay_in_leftover() {
        let parsed = parse("<b>bold</b> <search>q</search>");
        assert_eq!(kinds(&parsed), vec![ActionKind::Search]);
        assert_eq!(parsed.leftover, "<b>bold</b>");
    }

    #[test]
    fn regions_do_not_nest() {
        let parsed = parse("<code>x = '<search>inner</search>'</code>");
        assert_eq!(kinds(&parsed), vec![ActionKind::Code]);
        assert_eq!(parsed.actions[0].payload, "x = '<search>inner</search>'");
    }

    #[test]
    fn unmatched_tag_does_not_hide_later_tags() {
        let parsed = parse("<search>open forever <navigate>https://x.example</navigate>");
        assert_eq!(kinds(&parsed), vec![ActionKind::Navigate]);
        assert_eq!(parsed.leftover, "<search>open forever");
    }

    #[test]
    fn repeated_unclosed_tags_stay_text() {
        let noise = "<code> a < b ".repeat(2_000);
        let raw = format!("{noise}<search>still found</search>");
        let parsed = parse(&raw);

        assert_eq!(kinds(&parsed), vec![ActionKind::Search]);
        assert_eq!(parsed.actions[0].payload, "still found");
        assert_eq!(parsed.leftover, noise.trim());
    }

    #[test]
    fn overlong_tag_names_are_text() {
        let parsed = parse("<searchsearchsearchsearch>q</searchsearchsearchsearch>");
        assert!(!parsed.has_tags());
    }

    #[test]
    fn execute_alias_parses_as_code() {
        let parsed = parse("<execute>print(2 * 3)</execute>");
        assert_eq!(kinds(&parsed), vec![ActionKind::Code]);
        assert_eq!(parsed.actions[0].payload, "print(2 * 3)");
    }

    #[test]
    fn solution_is_reported_separately() {
        let parsed = parse("<thought>done</thought><solution> 42 </solution>");
        assert_eq!(parsed.solution.as_deref(), Some("42"));
        assert_eq!(kinds(&parsed), vec![ActionKind::Thought, ActionKind::None]);
        assert!(parsed.has_tags());
    }

    #[test]
    fn plain_text_yields_a_single_none_request() {
        let parsed = parse("The answer is 42.");
        assert_eq!(kinds(&parsed), vec![ActionKind::None]);
        assert_eq!(parsed.actions[0].payload, "The answer is 42.");
        assert!(!parsed.has_tags());
    }

    #[test]
    fn empty_input_is_fine() {
        let parsed = parse("");
        assert_eq!(kinds(&parsed), vec![ActionKind::None]);
        assert!(parsed.leftover.is_empty());
    }

    #[test]
    fn handles_multibyte_text_around_tags() {
        let parsed = parse("héllo <search>café ☕</search> wörld <");
        assert_eq!(parsed.actions[0].payload, "café ☕");
        assert_eq!(parsed.leftover, "héllo  wörld <");
    }

    #[test]
    fn into_parts_returns_actions_and_leftover() {
        let (actions, leftover) = parse("intro <code>1</code>").into_parts();
        assert_eq!(actions.len(), 1);
        assert_eq!(leftover, "intro");
    }
}
