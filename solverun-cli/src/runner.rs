//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization, the async runtime
//! and client construction to reduce duplication across command handlers.

use std::future::Future;
use std::path::Path;

use solverun::config::ConfigFile;
use solverun::logging::{default_log_file, init_logging, LoggingGuard};
use solverun::run::{ClientConfig, HttpOrchestrator, HttpRunClient};
use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
    runtime: Runtime,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    ///
    /// Logs go to the configured file. With `debug_mode` they are also
    /// echoed to stderr at debug level.
    pub fn with_debug(debug_mode: bool) -> Result<Self, CliError> {
        // Load config file (or use defaults if not present)
        let config = ConfigFile::load()?;

        let log_path = &config.logging.file;
        let log_dir = log_path.parent().unwrap_or_else(|| Path::new("."));
        let log_file = log_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| default_log_file().to_string());

        let logging_guard = init_logging(log_dir, &log_file, debug_mode, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            logging_guard,
            config,
            runtime,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("solverun v{}", solverun::VERSION);
        info!(
            command,
            base_url = %self.config.server.base_url,
            "solverun CLI starting"
        );
    }

    /// Connection settings, with an optional base URL override from the CLI.
    pub fn client_config(&self, url: Option<&str>) -> ClientConfig {
        let mut config = self.config.client_config();
        if let Some(url) = url {
            config.base_url = url.to_string();
        }
        config
    }

    /// Build a job-control client.
    pub fn client(&self, url: Option<&str>) -> Result<HttpRunClient, CliError> {
        Ok(HttpRunClient::new(self.client_config(url))?)
    }

    /// Build an orchestrator with the configured poll policy and timeout.
    pub fn orchestrator(&self, url: Option<&str>) -> Result<HttpOrchestrator, CliError> {
        Ok(HttpOrchestrator::connect(self.client_config(url))?
            .with_policy(self.config.poll_policy())
            .with_timeout(self.config.run_timeout()))
    }

    /// Run a future to completion on the runner's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
