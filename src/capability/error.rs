//! Capability error types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Errors raised by a capability call.
///
/// The kind is boxed to keep `Result<ActionResult, CapabilityError>` small.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityError {
    kind: Box<CapabilityErrorKind>,
}

/// Specific capability error types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityErrorKind {
    /// A single attempt exceeded its wall-clock budget
    Timeout {
        /// The operation that timed out
        operation: String,
        /// The budget that was exceeded
        duration: Duration,
    },
    /// The capability reported a failure
    Failure {
        /// The operation that failed
        operation: String,
        /// Reason for failure
        reason: String,
    },
    /// A page or step budget was reached
    BudgetExhausted {
        /// The configured limit
        limit: u32,
        /// What was counted against the limit
        what: String,
    },
    /// The execution environment could not run the code at all
    FatalExecution {
        /// Reason for failure
        reason: String,
    },
    /// The request itself was unusable (bad URL, empty query)
    InvalidInput {
        /// The operation that rejected the input
        operation: String,
        /// What was wrong with it
        reason: String,
    },
}

impl CapabilityError {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: CapabilityErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
        }
    }

    /// Returns a reference to the error kind.
    #[must_use]
    pub fn kind(&self) -> &CapabilityErrorKind {
        &self.kind
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::new(CapabilityErrorKind::Timeout {
            operation: operation.into(),
            duration,
        })
    }

    /// Creates a failure error.
    #[must_use]
    pub fn failure(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::Failure {
            operation: operation.into(),
            reason: reason.into(),
        })
    }

    /// Creates a budget exhausted error.
    #[must_use]
    pub fn budget_exhausted(limit: u32, what: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::BudgetExhausted {
            limit,
            what: what.into(),
        })
    }

    /// Creates a fatal execution error.
    #[must_use]
    pub fn fatal_execution(reason: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::FatalExecution {
            reason: reason.into(),
        })
    }

    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::InvalidInput {
            operation: operation.into(),
            reason: reason.into(),
        })
    }

    /// Returns true if this error is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(*self.kind, CapabilityErrorKind::Timeout { .. })
    }

    /// Returns true if this error must stop the agent loop.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(*self.kind, CapabilityErrorKind::FatalExecution { .. })
    }

    /// Returns true if another attempt could plausibly succeed.
    ///
    /// Timeouts and reported failures are transient; bad input, exhausted
    /// budgets and a broken execution environment are not.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            *self.kind,
            CapabilityErrorKind::Timeout { .. } | CapabilityErrorKind::Failure { .. }
        )
    }

    /// Returns true if this error is a budget limit.
    #[must_use]
    pub fn is_budget_exhausted(&self) -> bool {
        matches!(*self.kind, CapabilityErrorKind::BudgetExhausted { .. })
    }

    /// Short machine-readable label for the error kind.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match *self.kind {
            CapabilityErrorKind::Timeout { .. } => "capability_timeout",
            CapabilityErrorKind::Failure { .. } => "capability_failure",
            CapabilityErrorKind::BudgetExhausted { .. } => "budget_exhausted",
            CapabilityErrorKind::FatalExecution { .. } => "fatal_execution",
            CapabilityErrorKind::InvalidInput { .. } => "invalid_input",
        }
    }
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_ref() {
            CapabilityErrorKind::Timeout {
                operation,
                duration,
            } => {
                write!(
                    f,
                    "{} timed out after {:.1} seconds",
                    operation,
                    duration.as_secs_f64()
                )
            }
            CapabilityErrorKind::Failure { operation, reason } => {
                write!(f, "{} failed: {}", operation, reason)
            }
            CapabilityErrorKind::BudgetExhausted { limit, what } => {
                write!(f, "budget exhausted: limit of {} {} reached", limit, what)
            }
            CapabilityErrorKind::FatalExecution { reason } => {
                write!(
                    f,
                    "code execution failed fatally: {}; check the execution environment",
                    reason
                )
            }
            CapabilityErrorKind::InvalidInput { operation, reason } => {
                write!(f, "invalid input for {}: {}", operation, reason)
            }
        }
    }
}

impl std::error::Error for CapabilityError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_includes_operation_and_duration() {
        let error = CapabilityError::timeout("search", Duration::from_secs(120));
        let message = error.to_string();
        assert!(message.contains("search"));
        assert!(message.contains("120.0"));
        assert!(error.is_timeout());
        assert!(!error.is_fatal());
    }

    #[test]
    fn failure_display_includes_reason() {
        let error = CapabilityError::failure("navigate", "connection refused");
        assert_eq!(error.to_string(), "navigate failed: connection refused");
        assert_eq!(error.label(), "capability_failure");
    }

    #[test]
    fn fatal_execution_is_fatal() {
        let error = CapabilityError::fatal_execution("interpreter not found");
        assert!(error.is_fatal());
        assert!(error.to_string().contains("interpreter not found"));
    }

    #[test]
    fn budget_exhausted_display() {
        let error = CapabilityError::budget_exhausted(3, "pages");
        assert!(error.is_budget_exhausted());
        assert!(error.to_string().contains("limit of 3 pages"));
    }

    #[test]
    fn errors_are_comparable() {
        let a = CapabilityError::failure("search", "boom");
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, CapabilityError::failure("search", "other"));
    }

    #[test]
    fn serializes_through_json() {
        let error = CapabilityError::invalid_input("navigate", "empty url");
        let json = serde_json::to_value(&error).unwrap();
        let back: CapabilityError = serde_json::from_value(json).unwrap();
        assert_eq!(back, error);
    }

    #[test]
    fn only_transient_errors_are_retriable() {
        assert!(CapabilityError::timeout("search", Duration::from_secs(1)).is_retriable());
        assert!(CapabilityError::failure("search", "503").is_retriable());
        assert!(!CapabilityError::invalid_input("navigate", "empty url").is_retriable());
        assert!(!CapabilityError::budget_exhausted(10, "pages").is_retriable());
        assert!(!CapabilityError::fatal_execution("no interpreter").is_retriable());
    }
}
