//! Child-process execution environment.
//!
//! Runs each snippet through an external interpreter with a timeout and
//! captured output.

use super::{ExecutionOutput, ExecutionPort};
use crate::capability::CapabilityError;
use async_trait::async_trait;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Maximum output size to keep per stream (1MB).
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// How the code reaches the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeDelivery {
    /// Written to a temporary file whose path is passed as the last argument
    TempFile {
        /// File suffix, e.g. `.py`
        extension: String,
    },
    /// Passed inline after a flag, e.g. `python3 -c <code>`
    Inline {
        /// The flag preceding the code
        flag: String,
    },
}

/// Executes code in a fresh child process per call.
///
/// Each call gets its own process (and temp file, if used), so nothing leaks
/// from one snippet to the next. This is process isolation only; it is not a
/// security sandbox.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    interpreter: String,
    args: Vec<String>,
    delivery: CodeDelivery,
    timeout: Duration,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            args: Vec::new(),
            delivery: CodeDelivery::TempFile {
                extension: ".py".to_string(),
            },
            timeout: Duration::from_secs(120),
        }
    }
}

impl ProcessExecutor {
    /// Creates a Python executor with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interpreter binary.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Sets extra interpreter arguments placed before the code.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets how code is handed to the interpreter.
    #[must_use]
    pub fn with_delivery(mut self, delivery: CodeDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured interpreter.
    #[must_use]
    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Truncates output at a line boundary if it exceeds the maximum size.
    fn truncate_output(output: &str) -> String {
        if output.len() <= MAX_OUTPUT_SIZE {
            return output.to_string();
        }
        let mut cut = MAX_OUTPUT_SIZE;
        while !output.is_char_boundary(cut) {
            cut -= 1;
        }
        let cut = output[..cut].rfind('\n').unwrap_or(cut);
        format!(
            "{}\n\n... (output truncated, {} bytes total)",
            &output[..cut],
            output.len()
        )
    }
}

#[async_trait]
impl ExecutionPort for ProcessExecutor {
    async fn execute(&self, code: &str) -> Result<ExecutionOutput, CapabilityError> {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.args);

        // Held until the child exits so the script path stays valid.
        let _script = match &self.delivery {
            CodeDelivery::TempFile { extension } => {
                let mut file = tempfile::Builder::new()
                    .prefix("codeact-")
                    .suffix(extension)
                    .tempfile()
                    .map_err(|e| {
                        CapabilityError::fatal_execution(format!("failed to create script file: {e}"))
                    })?;
                file.write_all(code.as_bytes()).map_err(|e| {
                    CapabilityError::fatal_execution(format!("failed to write script file: {e}"))
                })?;
                cmd.arg(file.path());
                Some(file)
            }
            CodeDelivery::Inline { flag } => {
                cmd.arg(flag).arg(code);
                None
            }
        };

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            CapabilityError::fatal_execution(format!(
                "failed to spawn interpreter '{}': {e}",
                self.interpreter
            ))
        })?;

        tracing::debug!(
            interpreter = %self.interpreter,
            code_len = code.len(),
            "executing code"
        );

        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                Ok(ExecutionOutput {
                    stdout: Self::truncate_output(&stdout),
                    stderr: Self::truncate_output(&stderr),
                    exit_status: output.status.code(),
                    timed_out: false,
                })
            }
            Ok(Err(e)) => Err(CapabilityError::fatal_execution(format!(
                "failed to collect process output: {e}"
            ))),
            Err(_) => {
                // Dropping the wait future dropped the child, which kills it.
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs_f64(),
                    "code execution timed out"
                );
                Ok(ExecutionOutput {
                    stdout: String::new(),
                    stderr: format!(
                        "execution timed out after {:.1} seconds",
                        self.timeout.as_secs_f64()
                    ),
                    exit_status: None,
                    timed_out: true,
                })
            }
        }
    }
}
