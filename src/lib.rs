//! # codeact: turn-based agent orchestration
//!
//! A language model writes free text with tagged instructions; this crate
//! parses those instructions, runs at most one of them per turn, and feeds the
//! result back into the conversation for the next turn.
//!
//! ## Architecture
//!
//! - **Parser**: splits model output into typed action requests
//! - **Execution port**: runs `<code>` payloads in a child process
//! - **Research port**: serves `<search>`, `<navigate>` and `<research>`
//! - **Resilience**: retries, timeouts, caching and an error log around research
//! - **Conversation**: append-only history handed to the model every turn
//! - **Agent**: the control loop tying it all together
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use codeact::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let deps = AgentDependencies::new(
//!     Arc::new(ScriptedModel::new([
//!         "<search>quantum computing 2025</search>",
//!         "<solution>Found it.</solution>",
//!     ])),
//!     Arc::new(ProcessExecutor::new()),
//!     Arc::new(SimulatedResearch::new()),
//! );
//!
//! let controller = AgentController::new(deps, AgentConfig::default()).unwrap();
//! let outcome = controller.run_interaction("What happened in quantum computing?").await;
//!
//! assert_eq!(outcome.status, RunStatus::Completed);
//! assert!(!outcome.is_degraded());
//! # });
//! ```

pub mod action;
pub mod agent;
pub mod capability;
pub mod config;
pub mod conversation;
pub mod error;
pub mod execution;
pub mod logging;
pub mod model;
pub mod parser;
pub mod research;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{ActionKind, ActionRequest, ActionResult, CapabilitySource};
    pub use crate::agent::{
        AbortReason, AgentController, AgentDependencies, LoopState, Outcome, RunStatus,
    };
    pub use crate::capability::{CapabilityError, CapabilityErrorKind};
    pub use crate::config::{AgentConfig, CodeActConfig};
    pub use crate::conversation::{ConversationState, Role, Turn};
    pub use crate::error::{CodeActError, CodeActErrorKind};
    pub use crate::execution::{ExecutionOutput, ExecutionPort, ProcessExecutor};
    pub use crate::logging::{init_logging, LoggingConfig};
    pub use crate::model::{ModelError, ModelProvider, ScriptedModel};
    pub use crate::parser::{parse, ActionParser, ParsedOutput};
    pub use crate::research::{
        CachePolicy, ResearchExtensions, ResearchMethod, ResearchPort, ResiliencePolicy,
        ResilientResearch, RetryStrategy, SimulatedResearch, WebResearch,
    };
    pub use crate::types::RunId;
}
