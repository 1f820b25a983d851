//! Choosing the one action a turn dispatches.
//!
//! Priority: the first `code` request wins over any research-family request.
//! Otherwise the first research-family request in document order wins. Every
//! other executable request is discarded for this turn; nothing is queued.

use crate::action::{ActionKind, ActionRequest};

/// What a turn will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch<'a> {
    /// Run code through the execution port
    Execute(&'a ActionRequest),
    /// Send a research-family request to the research port
    Research(&'a ActionRequest),
    /// A research request was chosen but research is disabled
    Suppressed(&'a ActionRequest),
    /// Nothing executable was found
    Idle,
}

impl<'a> Dispatch<'a> {
    /// The request this dispatch refers to.
    #[must_use]
    pub fn request(&self) -> Option<&'a ActionRequest> {
        match *self {
            Self::Execute(r) | Self::Research(r) | Self::Suppressed(r) => Some(r),
            Self::Idle => None,
        }
    }

    /// Returns true if a capability will be called.
    #[must_use]
    pub fn calls_capability(&self) -> bool {
        matches!(self, Self::Execute(_) | Self::Research(_))
    }
}

/// The chosen dispatch plus everything that lost out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<'a> {
    /// What runs this turn
    pub dispatch: Dispatch<'a>,
    /// Executable requests that were not chosen, in document order
    pub discarded: Vec<&'a ActionRequest>,
}

/// Picks at most one request from a parsed output.
#[must_use]
pub fn select(actions: &[ActionRequest], research_enabled: bool) -> Selection<'_> {
    let chosen = actions
        .iter()
        .find(|a| a.kind == ActionKind::Code)
        .or_else(|| actions.iter().find(|a| a.kind.is_research_family()));

    let dispatch = match chosen {
        Some(request) if request.kind == ActionKind::Code => Dispatch::Execute(request),
        Some(request) if research_enabled => Dispatch::Research(request),
        Some(request) => Dispatch::Suppressed(request),
        None => Dispatch::Idle,
    };

    let discarded = actions
        .iter()
        .filter(|a| a.kind.is_executable())
        .filter(|a| !chosen.is_some_and(|c| std::ptr::eq(*a, c)))
        .collect();

    Selection {
        dispatch,
        discarded,
    }
}
