//! Configuration file loading.
//!
//! Reads codeact configuration from TOML files at project-local and
//! XDG-compliant locations.

use crate::config::types::CodeActConfig;
use crate::error::CodeActError;
use std::path::{Path, PathBuf};

/// Default configuration file name for project-local config.
const LOCAL_CONFIG_NAME: &str = "codeact.toml";

/// Default configuration file name within XDG config directory.
const XDG_CONFIG_NAME: &str = "config.toml";

/// Application name for XDG directory lookup.
const APP_NAME: &str = "codeact";

/// Loads configuration from the default search paths.
///
/// Search order:
/// 1. `./codeact.toml` (project-local)
/// 2. `~/.config/codeact/config.toml` (XDG config)
///
/// Returns the default configuration if no config file is found.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be parsed.
pub fn load() -> Result<CodeActConfig, CodeActError> {
    for path in search_paths() {
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading configuration");
            return from_path(&path);
        }
    }

    tracing::debug!("no configuration file found, using defaults");
    Ok(CodeActConfig::default())
}

/// Loads configuration from a specific file path.
///
/// # Errors
///
/// Returns an error if the file cannot be read or its TOML does not match
/// the expected layout.
pub fn from_path(path: &Path) -> Result<CodeActConfig, CodeActError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CodeActError::configuration(
            "config_file",
            format!("failed to read '{}': {}", path.display(), e),
        )
    })?;

    from_str(&contents).map_err(|e| {
        CodeActError::configuration(
            "config_file",
            format!("failed to parse '{}': {}", path.display(), e),
        )
    })
}

/// Parses configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or doesn't match the layout.
///
/// # Example
///
/// ```rust
/// use codeact::config::from_str;
///
/// let config = from_str(r#"
/// [agent]
/// max_turns = 8
/// enable_research = false
/// "#).unwrap();
///
/// let agent = config.agent_config().unwrap();
/// assert_eq!(agent.max_turns, 8);
/// assert!(!agent.enable_research);
/// ```
pub fn from_str(toml_str: &str) -> Result<CodeActConfig, CodeActError> {
    toml::from_str(toml_str)
        .map_err(|e| CodeActError::configuration("config", format!("invalid TOML: {e}")))
}

/// Returns the paths that would be searched for configuration files.
///
/// Used by `codeact config-paths`.
#[must_use]
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_NAME)];

    if let Some(dir) = xdg_config_dir() {
        paths.push(dir.join(XDG_CONFIG_NAME));
    }

    paths
}

/// Returns the XDG config directory for codeact, `~/.config/codeact` on most systems.
#[must_use]
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_NAME))
}
