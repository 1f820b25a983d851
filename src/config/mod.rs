//! Configuration management for codeact.
//!
//! [`AgentConfig`] is what a controller runs with. [`CodeActConfig`] is the
//! TOML file layout that produces it, plus the settings for the execution and
//! research backends and for logging.
//!
//! # Configuration File Format
//!
//! The search order is:
//! 1. `./codeact.toml` (project-local)
//! 2. `~/.config/codeact/config.toml` (XDG config)
//!
//! ```toml
//! [agent]
//! max_turns = 5
//! enable_research = true
//! research_timeout_secs = 120
//! max_pages_per_task = 10
//! max_retries = 3
//! retry_delay_secs = 2.0
//! retry_strategy = "fixed"      # fixed | linear | exponential
//! cache = "until_cleared"       # until_cleared | ttl | disabled
//!
//! [execution]
//! interpreter = "python3"
//! extension = ".py"
//! timeout_secs = 120
//!
//! [research]
//! backend = "simulated"         # simulated | web
//!
//! [logging]
//! level = "info"
//! console = true
//! ```

mod agent;
mod file;
mod types;

pub use agent::AgentConfig;
pub use file::{from_path, from_str, load, search_paths, xdg_config_dir};
pub use types::{
    AgentFileConfig, CacheMode, CodeActConfig, ExecutionFileConfig, ResearchBackend,
    ResearchFileConfig,
};
