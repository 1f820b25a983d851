//! Logging setup for the codeact binary and embedding applications.
//!
//! Events go to stderr, to a daily rolling file, or both. The level comes
//! from [`LoggingConfig::level`] unless `RUST_LOG` is set, in which case the
//! environment wins.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Where and how much to log.
///
/// # Example
///
/// ```rust
/// use codeact::logging::{LogLevel, LoggingConfig};
///
/// let config = LoggingConfig::new()
///     .with_app_name("research-bot")
///     .with_level(LogLevel::Debug)
///     .with_console(false);
/// assert!(config.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether the rolling log file is written.
    pub enabled: bool,
    /// Log files are named `{app_name}.log` with daily rotation.
    pub app_name: String,
    /// Custom log directory. If None, uses XDG data dir + "codeact/logs".
    pub log_dir: Option<PathBuf>,
    /// Level filter when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Whether events are also printed to stderr.
    pub console: bool,
}

impl LoggingConfig {
    /// Creates a new LoggingConfig with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with file logging off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Sets the application name for log file naming.
    #[must_use]
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Sets a custom log directory.
    #[must_use]
    pub fn with_log_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(path.into());
        self
    }

    /// Sets the log level filter.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Turns stderr output on or off.
    #[must_use]
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: "codeact".to_string(),
            log_dir: None,
            level: LogLevel::default(),
            console: true,
        }
    }
}

/// Log level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level - most verbose.
    Trace,
    /// Debug level.
    Debug,
    /// Info level - default.
    #[default]
    Info,
    /// Warn level.
    Warn,
    /// Error level - least verbose.
    Error,
}

impl LogLevel {
    /// Directive string understood by [`EnvFilter`].
    #[must_use]
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Keeps the file writer alive; dropping it flushes pending events.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

impl fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingGuard").finish_non_exhaustive()
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingError {
    /// The specific error that occurred.
    pub kind: LoggingErrorKind,
}

/// Specific logging error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingErrorKind {
    /// Failed to determine XDG data directory.
    NoDataDir,
    /// Failed to create log directory.
    CreateDirFailed {
        /// The path that could not be created.
        path: PathBuf,
        /// The reason for failure.
        reason: String,
    },
    /// Subscriber initialization failed.
    SubscriberInitFailed {
        /// The reason for failure.
        reason: String,
    },
}

impl LoggingError {
    /// Creates a new LoggingError with the given kind.
    #[must_use]
    pub fn new(kind: LoggingErrorKind) -> Self {
        Self { kind }
    }

    /// Creates an error for missing XDG data directory.
    #[must_use]
    pub fn no_data_dir() -> Self {
        Self::new(LoggingErrorKind::NoDataDir)
    }

    /// Creates an error for failed directory creation.
    #[must_use]
    pub fn create_dir_failed(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::CreateDirFailed {
            path,
            reason: reason.into(),
        })
    }

    /// Creates an error for subscriber initialization failure.
    #[must_use]
    pub fn subscriber_init_failed(reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::SubscriberInitFailed {
            reason: reason.into(),
        })
    }
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LoggingErrorKind::NoDataDir => {
                write!(
                    f,
                    "could not determine XDG data directory; \
                     set XDG_DATA_HOME or use a custom log_dir"
                )
            }
            LoggingErrorKind::CreateDirFailed { path, reason } => {
                write!(
                    f,
                    "failed to create log directory '{}': {}; check permissions",
                    path.display(),
                    reason
                )
            }
            LoggingErrorKind::SubscriberInitFailed { reason } => {
                write!(
                    f,
                    "failed to initialize tracing subscriber: {}; \
                     a subscriber may already be set",
                    reason
                )
            }
        }
    }
}

impl std::error::Error for LoggingError {}

/// Resolves the log directory: `config.log_dir`, else XDG data dir + "codeact/logs".
pub fn log_dir(config: &LoggingConfig) -> Result<PathBuf, LoggingError> {
    if let Some(ref custom_dir) = config.log_dir {
        return Ok(custom_dir.clone());
    }

    dirs::data_local_dir()
        .map(|dir| dir.join("codeact").join("logs"))
        .ok_or_else(LoggingError::no_data_dir)
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_directive()))
}

/// Installs the global tracing subscriber.
///
/// Returns `Ok(Some(guard))` when file logging is on; hold the guard for as
/// long as events should reach the file. Returns `Ok(None)` when only the
/// console layer (or nothing) was installed.
///
/// # Errors
///
/// Fails if the log directory cannot be created or a global subscriber is
/// already set.
///
/// # Example
///
/// ```rust,ignore
/// use codeact::logging::{init_logging, LoggingConfig};
///
/// let _guard = init_logging(&LoggingConfig::disabled())?;
/// tracing::info!("console only");
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<Option<LoggingGuard>, LoggingError> {
    let (file_layer, guard) = if config.enabled {
        let dir = log_dir(config)?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| LoggingError::create_dir_failed(dir.clone(), e.to_string()))?;

        let appender = tracing_appender::rolling::daily(&dir, format!("{}.log", config.app_name));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(LoggingGuard { _guard: guard }))
    } else {
        (None, None)
    };

    let console_layer = config.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| LoggingError::subscriber_init_failed(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_config_default_values() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert!(config.console);
        assert_eq!(config.app_name, "codeact");
        assert!(config.log_dir.is_none());
        assert_eq!(config.level, LogLevel::Info);
    }

    #[test]
    fn logging_config_builder_pattern() {
        let config = LoggingConfig::new()
            .with_app_name("my-app")
            .with_log_dir("/tmp/logs")
            .with_level(LogLevel::Debug)
            .with_console(false);

        assert_eq!(config.app_name, "my-app");
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/logs")));
        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.console);
    }

    #[test]
    fn disabled_turns_off_file_only() {
        let config = LoggingConfig::disabled();
        assert!(!config.enabled);
        assert!(config.console);
    }

    #[test]
    fn log_level_directives() {
        assert_eq!(LogLevel::Trace.as_directive(), "trace");
        assert_eq!(LogLevel::Warn.as_directive(), "warn");
    }

    #[test]
    fn log_level_parses_lowercase() {
        let config: LoggingConfig = toml::from_str("level = \"debug\"\nconsole = false").unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.console);
        assert!(config.enabled);
    }

    #[test]
    fn log_dir_uses_custom_when_provided() {
        let config = LoggingConfig::default().with_log_dir("/custom/logs");
        assert_eq!(log_dir(&config).unwrap(), PathBuf::from("/custom/logs"));
    }

    #[test]
    fn log_dir_uses_xdg_when_not_provided() {
        if let Ok(resolved) = log_dir(&LoggingConfig::default()) {
            assert!(resolved.ends_with("codeact/logs"));
        }
    }

    #[test]
    fn create_dir_failed_display() {
        let error =
            LoggingError::create_dir_failed(PathBuf::from("/nonexistent/path"), "permission denied");
        let message = error.to_string();
        assert!(message.contains("/nonexistent/path"));
        assert!(message.contains("permission denied"));
    }
}
