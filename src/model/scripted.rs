//! A model that replays fixed responses.

use super::{ModelError, ModelProvider};
use crate::conversation::Turn;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Line that separates responses in a script file.
pub const SCRIPT_SEPARATOR: &str = "---";

/// Replays a list of responses, one per call, in order.
///
/// Once the list is used up the model returns its fallback, or
/// [`ModelError::exhausted`] if it has none.
///
/// # Example
///
/// ```
/// use codeact::model::{ModelProvider, ScriptedModel};
///
/// # tokio_test::block_on(async {
/// let model = ScriptedModel::new(["<code>print(1)</code>", "<solution>1</solution>"]);
/// assert_eq!(model.generate(&[]).await.unwrap(), "<code>print(1)</code>");
/// assert_eq!(model.generate(&[]).await.unwrap(), "<solution>1</solution>");
/// assert!(model.generate(&[]).await.is_err());
/// # });
/// ```
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    served: Mutex<usize>,
    fallback: Option<String>,
}

impl ScriptedModel {
    /// Creates a model that replays `responses`.
    #[must_use]
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            served: Mutex::new(0),
            fallback: None,
        }
    }

    /// Parses a script: responses separated by lines containing only `---`.
    ///
    /// Blank responses are skipped.
    #[must_use]
    pub fn from_script(script: &str) -> Self {
        let mut responses = Vec::new();
        let mut current = Vec::new();
        for line in script.lines() {
            if line.trim() == SCRIPT_SEPARATOR {
                responses.push(current.join("\n"));
                current.clear();
            } else {
                current.push(line);
            }
        }
        responses.push(current.join("\n"));

        Self::new(
            responses
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        )
    }

    /// Sets the response returned once the script is used up.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// How many responses have been served so far, fallbacks included.
    #[must_use]
    pub fn served(&self) -> usize {
        self.served.lock().map(|n| *n).unwrap_or_default()
    }

    /// Responses left in the script, not counting the fallback.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelProvider for ScriptedModel {
    async fn generate(&self, history: &[Turn]) -> Result<String, ModelError> {
        let next = self
            .responses
            .lock()
            .map_err(|_| ModelError::provider("scripted model lock poisoned"))?
            .pop_front();
        let mut served = self
            .served
            .lock()
            .map_err(|_| ModelError::provider("scripted model lock poisoned"))?;

        let response = match next.or_else(|| self.fallback.clone()) {
            Some(response) => response,
            None => return Err(ModelError::exhausted(*served)),
        };
        *served += 1;
        tracing::trace!(history = history.len(), served = *served, "scripted response");
        Ok(response)
    }
}
