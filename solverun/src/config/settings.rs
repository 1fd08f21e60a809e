//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    /// Solver backend connection
    pub server: ServerSettings,
    /// Per-run time budget
    pub run: RunSettings,
    /// Poll loop timing
    pub poll: PollSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Solver backend connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Base URL of the job-control API, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Bearer token sent with every request, if set.
    pub api_token: Option<String>,
    /// Timeout in seconds for a single request (and for opening the stream).
    pub request_timeout_secs: u64,
}

/// Per-run time budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Soft timeout requested for each run.
    pub timeout_secs: u64,
    /// Grace period added to the soft timeout before the client gives up.
    pub grace_secs: u64,
}

/// Poll loop timing.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    /// First backoff delay.
    pub initial_delay_ms: u64,
    /// Backoff ceiling.
    pub max_delay_ms: u64,
    /// Backoff growth factor (>= 1.0).
    pub multiplier: f64,
    /// Fixed delay while a succeeded run has no result yet.
    pub materialize_delay_ms: u64,
    /// Consecutive result-less succeeded observations tolerated.
    pub max_materialize_retries: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
