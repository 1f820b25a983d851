//! Append-only conversation history.
//!
//! [`ConversationState`] owns the ordered [`Turn`]s of one interaction. Turns
//! can only be appended and read back; nothing removes, edits or reorders
//! them, so the history handed to the model on turn *n* is always a prefix of
//! the history it sees on turn *n + 1*.
//!
//! # Example
//!
//! ```
//! use codeact::conversation::{ConversationState, Role};
//!
//! let mut state = ConversationState::new();
//! state.append(Role::User, "What is 2 * 3?");
//! state.append(Role::Assistant, "<code>print(2 * 3)</code>");
//!
//! assert_eq!(state.len(), 2);
//! assert_eq!(state.last().map(|t| t.role), Some(Role::Assistant));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human instruction that started the run
    User,
    /// Raw model output
    Assistant,
    /// Capability observations and loop notes
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// One role-attributed entry in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn
    pub role: Role,
    /// The text content
    pub content: String,
    /// When the turn was appended
    pub timestamp: DateTime<Utc>,
    /// Structured detail about the turn (action kind, success, source)
    #[serde(default)]
    pub metadata: Value,
}

impl Turn {
    fn new(role: Role, content: String, metadata: Value) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now(),
            metadata,
        }
    }
}

/// Ordered, append-only history of turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn without metadata.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> &Turn {
        self.append_with(role, content, Value::Null)
    }

    /// Appends a turn with structured metadata and returns it.
    pub fn append_with(
        &mut self,
        role: Role,
        content: impl Into<String>,
        metadata: Value,
    ) -> &Turn {
        let turn = Turn::new(role, content.into(), metadata);
        tracing::trace!(role = %turn.role, index = self.turns.len(), "turn appended");
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    /// All turns in insertion order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent turn.
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True if nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Iterates over the turns of one role.
    pub fn by_role(&self, role: Role) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(move |t| t.role == role)
    }

    /// Consumes the state, returning the turns.
    #[must_use]
    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    /// Renders the history as a plain transcript, one block per turn.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("[{}]\n{}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
