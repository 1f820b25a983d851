//! Loop states and run outcomes.
//!
//! A run starts [`LoopState::Running`] and ends in exactly one terminal state.
//! The reason a run was aborted is carried by [`AbortReason`] so callers can
//! tell a spent turn budget from a broken execution environment.

use crate::capability::CapabilityError;
use crate::conversation::{Role, Turn};
use crate::model::ModelError;
use crate::types::RunId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the control loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoopState {
    /// Querying the model and dispatching actions
    #[default]
    Running,
    /// The model produced a final answer
    Completed,
    /// The run stopped without a final answer
    Aborted,
}

impl LoopState {
    /// Returns true for `Completed` and `Aborted`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Why a run stopped without completing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Every allowed model query was used without a final answer
    TurnBudgetExhausted {
        /// The configured turn budget
        max_turns: u32,
    },
    /// The execution port could not run code at all
    FatalExecution(CapabilityError),
    /// The model provider failed to answer
    ModelFailure(ModelError),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TurnBudgetExhausted { max_turns } => {
                write!(f, "turn budget of {} exhausted", max_turns)
            }
            Self::FatalExecution(error) => write!(f, "fatal execution error: {}", error),
            Self::ModelFailure(error) => write!(f, "model failure: {}", error),
        }
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The model produced a final answer
    Completed,
    /// The run stopped early
    Aborted(AbortReason),
}

impl RunStatus {
    /// The terminal loop state this status corresponds to.
    #[must_use]
    pub fn state(&self) -> LoopState {
        match self {
            Self::Completed => LoopState::Completed,
            Self::Aborted(_) => LoopState::Aborted,
        }
    }

    /// Returns true if the run produced a final answer.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the run stopped early.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// The abort reason, if any.
    #[must_use]
    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            Self::Aborted(reason) => Some(reason),
            Self::Completed => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "{}", LoopState::Completed),
            Self::Aborted(reason) => write!(f, "{} ({})", LoopState::Aborted, reason),
        }
    }
}

/// Everything a caller gets back from one interaction.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Identifier tagging this run's log events
    pub run_id: RunId,
    /// How the run ended
    pub status: RunStatus,
    /// Human-readable result, never empty
    pub final_text: String,
    /// Every turn appended during the run, in order
    pub history: Vec<Turn>,
    /// Number of model queries made
    pub turns_used: u32,
    /// Research calls that exhausted their retries and fell back
    pub degraded_actions: u32,
}

impl Outcome {
    /// Returns true if the run produced a final answer.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// Returns true if any research call degraded to its fallback.
    ///
    /// A completed run can still be degraded: the answer was produced
    /// without some of the research the model asked for.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded_actions > 0
    }

    /// Turns of one role, in order.
    pub fn turns_by(&self, role: Role) -> impl Iterator<Item = &Turn> {
        self.history.iter().filter(move |t| t.role == role)
    }
}
