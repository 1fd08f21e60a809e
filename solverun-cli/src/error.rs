//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use solverun::config::ConfigFileError;
use solverun::run::{RunError, TransportError};

/// Exit code used when the user cancels a run.
const EXIT_CANCELLED: i32 = 130;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Failed to read the job file
    JobRead { path: String, error: std::io::Error },
    /// Job file is not a usable job
    InvalidJob { path: String, reason: String },
    /// Request to the solver failed
    Request(TransportError),
    /// Run ended without a result
    Run(RunError),
    /// Failed to render output
    Output(serde_json::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Request(TransportError::Network(_))
            | CliError::Run(RunError::Transport(TransportError::Network(_))) => {
                eprintln!();
                eprintln!("Could not reach the solver. Check that:");
                eprintln!("  1. The service is running");
                eprintln!("  2. server.base_url is correct (solverun config get server.base_url)");
            }
            CliError::Request(TransportError::Status { status: 401, .. })
            | CliError::Run(RunError::Transport(TransportError::Status { status: 401, .. })) => {
                eprintln!();
                eprintln!("Set an API token with: solverun config set server.api_token <token>");
            }
            CliError::Run(RunError::RunTimedOut { .. }) => {
                eprintln!();
                eprintln!("The run may still be going. Try a longer --timeout, or check it with:");
                eprintln!("  solverun status <run_id>");
            }
            CliError::Run(RunError::RunCancelled) => process::exit(EXIT_CANCELLED),
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::JobRead { path, error } => {
                write!(f, "Failed to read job file '{}': {}", path, error)
            }
            CliError::InvalidJob { path, reason } => {
                write!(f, "Invalid job file '{}': {}", path, reason)
            }
            CliError::Request(e) => write!(f, "Request failed: {}", e),
            CliError::Run(e) => write!(f, "{}", e),
            CliError::Output(e) => write!(f, "Failed to render output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Runtime(e) => Some(e),
            CliError::JobRead { error, .. } => Some(error),
            CliError::Request(e) => Some(e),
            CliError::Run(e) => Some(e),
            CliError::Output(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<TransportError> for CliError {
    fn from(e: TransportError) -> Self {
        CliError::Request(e)
    }
}

impl From<RunError> for CliError {
    fn from(e: RunError) -> Self {
        CliError::Run(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_error_message_is_passed_through() {
        let err = CliError::from(RunError::RunFailed {
            message: "infeasible".to_string(),
        });
        assert!(err.to_string().contains("infeasible"));
    }

    #[test]
    fn test_invalid_job_message_names_file() {
        let err = CliError::InvalidJob {
            path: "job.json".to_string(),
            reason: "expected a JSON object".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid job file 'job.json': expected a JSON object"
        );
    }
}
