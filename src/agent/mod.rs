//! Agent control loop.
//!
//! [`AgentController`] runs one interaction at a time: model query, parse,
//! dispatch at most one action, record the observation, repeat. Dispatch
//! priority lives in [`dispatch`]; lifecycle and outcome types in [`state`].

mod controller;
pub mod dispatch;
pub mod state;

pub use controller::{
    AgentController, AgentDependencies, FINISHED_PREFIX, MAX_TURNS_TEXT, NO_ACTION_NOTE,
};
pub use dispatch::{select, Dispatch, Selection};
pub use state::{AbortReason, LoopState, Outcome, RunStatus};
