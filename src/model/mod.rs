//! The model boundary.
//!
//! The agent loop only needs one thing from a language model: given the
//! conversation so far, produce the next raw output. Everything else (prompt
//! formatting, transport, authentication) belongs to the implementation.

mod error;
mod scripted;

pub use error::{ModelError, ModelErrorKind};
pub use scripted::{ScriptedModel, SCRIPT_SEPARATOR};

use crate::conversation::Turn;
use async_trait::async_trait;
use std::fmt::Debug;

/// Produces the next model output for a conversation.
#[async_trait]
pub trait ModelProvider: Send + Sync + Debug {
    /// Generates the raw output for the next assistant turn.
    ///
    /// `history` is the full conversation, oldest turn first.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if no output can be produced; the loop aborts.
    async fn generate(&self, history: &[Turn]) -> Result<String, ModelError>;
}
