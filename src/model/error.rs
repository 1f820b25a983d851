//! Model provider error types.

use std::fmt;

/// Errors raised while asking the model for its next output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelError {
    /// The specific error that occurred
    pub kind: ModelErrorKind,
}

/// Specific model error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelErrorKind {
    /// A scripted model has no responses left
    Exhausted {
        /// How many responses were served before running out
        served: usize,
    },
    /// The provider failed to produce output
    Provider {
        /// Reason for failure
        reason: String,
    },
}

impl ModelError {
    /// Creates a new ModelError with the given kind.
    #[must_use]
    pub fn new(kind: ModelErrorKind) -> Self {
        Self { kind }
    }

    /// Creates an exhausted error.
    #[must_use]
    pub fn exhausted(served: usize) -> Self {
        Self::new(ModelErrorKind::Exhausted { served })
    }

    /// Creates a provider error.
    #[must_use]
    pub fn provider(reason: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Provider {
            reason: reason.into(),
        })
    }

    /// Returns true if the model ran out of scripted responses.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ModelErrorKind::Exhausted { .. })
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ModelErrorKind::Exhausted { served } => {
                write!(
                    f,
                    "model has no responses left after {} turns; add responses or a fallback",
                    served
                )
            }
            ModelErrorKind::Provider { reason } => {
                write!(f, "model provider failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for ModelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_display_is_actionable() {
        let error = ModelError::exhausted(2);
        assert!(error.is_exhausted());
        assert!(error.to_string().contains("after 2 turns"));
        assert!(error.to_string().contains("fallback"));
    }

    #[test]
    fn provider_display_includes_reason() {
        let error = ModelError::provider("connection reset");
        assert!(!error.is_exhausted());
        assert_eq!(error.to_string(), "model provider failed: connection reset");
    }
}
