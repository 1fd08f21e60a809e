//! Configuration file handling for ~/.solverun/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub use super::defaults::*;
pub use super::settings::*;

use crate::run::{ClientConfig, PollPolicy};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.solverun/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }

    /// Connection settings for the run client and push transport.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.server.base_url.clone())
            .with_request_timeout(Duration::from_secs(self.server.request_timeout_secs));
        if let Some(token) = &self.server.api_token {
            config = config.with_api_token(token.clone());
        }
        config
    }

    /// Poll loop timing, including the run grace period.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_millis(self.poll.initial_delay_ms),
            max_delay: Duration::from_millis(self.poll.max_delay_ms),
            multiplier: self.poll.multiplier,
            grace: Duration::from_secs(self.run.grace_secs),
            materialize_delay: Duration::from_millis(self.poll.materialize_delay_ms),
            max_materialize_retries: self.poll.max_materialize_retries,
        }
    }

    /// Soft timeout requested for each run.
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run.timeout_secs)
    }
}

/// Get the path to the config directory (~/.solverun).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".solverun")
}

/// Get the path to the config file (~/.solverun/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
