//! Code execution port.
//!
//! The agent loop hands every dispatched `<code>` payload to an
//! [`ExecutionPort`]. Implementations must not leak state between calls: each
//! call sees a fresh environment.
//!
//! An `Err` from [`ExecutionPort::execute`] means the environment itself is
//! broken (the interpreter cannot be started, output cannot be collected) and
//! stops the loop. Code that runs and fails is reported as a normal
//! [`ExecutionOutput`] with a non-zero exit status.

mod process;

pub use process::{CodeDelivery, ProcessExecutor};

use crate::action::{ActionResult, CapabilitySource};
use crate::capability::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Captured result of running one code snippet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Process exit code; `None` if the process was killed or timed out
    pub exit_status: Option<i32>,
    /// Whether the run was cut short by the execution timeout
    #[serde(default)]
    pub timed_out: bool,
}

impl ExecutionOutput {
    /// Creates an output for a run that exited normally.
    #[must_use]
    pub fn exited(stdout: impl Into<String>, stderr: impl Into<String>, code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status: Some(code),
            timed_out: false,
        }
    }

    /// True if the code ran to completion with exit status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_status == Some(0) && !self.timed_out
    }

    /// Renders the observation the model sees on the next turn.
    #[must_use]
    pub fn render(&self) -> String {
        let mut obs = String::from("Observation: ");
        if self.success() {
            obs.push_str("Code executed successfully.\n");
        } else if self.timed_out {
            obs.push_str("Code execution timed out.\n");
        } else {
            obs.push_str("Code execution failed.\n");
        }
        if !self.stdout.is_empty() {
            obs.push_str(&format!("STDOUT:\n{}\n", self.stdout));
        }
        if !self.stderr.is_empty() {
            obs.push_str(&format!("STDERR:\n{}\n", self.stderr));
        }
        obs.trim().to_string()
    }

    /// Converts into the loop's result type.
    #[must_use]
    pub fn into_action_result(self) -> ActionResult {
        let output = self.render();
        let data = serde_json::json!({
            "stdout": self.stdout,
            "stderr": self.stderr,
            "exit_status": self.exit_status,
            "timed_out": self.timed_out,
        });
        let result = if self.success() {
            ActionResult::success(CapabilitySource::Execution, output)
        } else {
            let reason = match self.exit_status {
                Some(code) => format!("exit status {code}"),
                None => "process did not exit normally".to_string(),
            };
            ActionResult::failure(
                CapabilitySource::Execution,
                output,
                Some(CapabilityError::failure("execute", reason)),
            )
        };
        result.with_data(data)
    }
}

/// Runs code snippets on behalf of the agent loop.
#[async_trait]
pub trait ExecutionPort: Send + Sync + Debug {
    /// Runs `code` in a fresh environment.
    ///
    /// # Errors
    ///
    /// Returns a [`CapabilityError`] of kind `FatalExecution` when the
    /// environment cannot run code at all.
    async fn execute(&self, code: &str) -> Result<ExecutionOutput, CapabilityError>;
}
