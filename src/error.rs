//! Crate-level error type.
//!
//! Errors raised while setting up a run: invalid configuration, unreadable
//! config files, research backends that cannot be constructed. Errors raised
//! inside a run are reported through the run's [`Outcome`](crate::agent::Outcome)
//! instead.
//!
//! No external error crates (anyhow, thiserror, eyre) are used.

use crate::capability::CapabilityError;
use crate::model::ModelError;
use std::fmt;

/// Errors returned by the codeact setup API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeActError {
    /// The specific error that occurred
    pub kind: CodeActErrorKind,
}

/// Specific setup error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeActErrorKind {
    /// A configuration value was missing or out of range
    Configuration {
        /// The field that was invalid
        field: String,
        /// Why it was invalid
        reason: String,
    },
    /// A capability could not be constructed
    Capability {
        /// The underlying capability error
        source: CapabilityError,
    },
    /// The model could not be constructed
    Model {
        /// The underlying model error
        source: ModelError,
    },
}

impl CodeActError {
    /// Creates a new CodeActError with the given kind.
    #[must_use]
    pub fn new(kind: CodeActErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(CodeActErrorKind::Configuration {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Returns true if this error indicates a configuration problem.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, CodeActErrorKind::Configuration { .. })
    }
}

impl fmt::Display for CodeActError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CodeActErrorKind::Configuration { field, reason } => {
                write!(f, "configuration error for '{}': {}", field, reason)
            }
            CodeActErrorKind::Capability { source } => {
                write!(f, "capability setup failed: {}", source)
            }
            CodeActErrorKind::Model { source } => {
                write!(f, "model setup failed: {}", source)
            }
        }
    }
}

impl std::error::Error for CodeActError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            CodeActErrorKind::Capability { source } => Some(source),
            CodeActErrorKind::Model { source } => Some(source),
            CodeActErrorKind::Configuration { .. } => None,
        }
    }
}

impl From<CapabilityError> for CodeActError {
    fn from(source: CapabilityError) -> Self {
        Self::new(CodeActErrorKind::Capability { source })
    }
}

impl From<ModelError> for CodeActError {
    fn from(source: ModelError) -> Self {
        Self::new(CodeActErrorKind::Model { source })
    }
}
