//! Error types for run orchestration.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single request against the job-control or stream endpoints.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be sent or the connection dropped.
    #[error("Request failed: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} {status_text} from {url}")]
    Status {
        status: u16,
        status_text: String,
        url: String,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    /// Whether retrying the same request may succeed.
    ///
    /// Client errors (4xx) are not retryable except 408 and 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Decode(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Client(_) => false,
        }
    }
}

/// Terminal outcome of a run other than success.
///
/// Exactly one of these, or a result, is returned per run.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    /// The run could not be launched.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The backend reported the run as failed.
    #[error("Run failed: {message}")]
    RunFailed { message: String },

    /// The run was cancelled by the backend or by the caller.
    #[error("Run cancelled")]
    RunCancelled,

    /// The backend kept reporting success without a result payload.
    #[error("Run succeeded but no result was available after {observations} observations")]
    ResultUnavailable { observations: u32 },

    /// No terminal status was observed before the deadline.
    #[error("Run timed out after {elapsed:?}")]
    RunTimedOut {
        elapsed: Duration,
        /// Last transport failure seen while polling, if any.
        last_transport_error: Option<String>,
    },
}

impl RunError {
    /// Backend failure message used when the status carries none.
    pub const GENERIC_FAILURE: &'static str = "run failed";

    /// Builds a [`RunError::RunFailed`] from an optional backend message.
    pub fn failed(message: Option<&str>) -> Self {
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(Self::GENERIC_FAILURE);
        Self::RunFailed {
            message: message.to_string(),
        }
    }

    /// Short machine-readable kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::RunFailed { .. } => "run_failed",
            Self::RunCancelled => "run_cancelled",
            Self::ResultUnavailable { .. } => "result_unavailable",
            Self::RunTimedOut { .. } => "run_timed_out",
        }
    }

    /// Run errors are terminal; only launch-time transport errors may be
    /// worth retrying by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// A push-channel message whose envelope could not be decoded.
///
/// Never surfaced to callers; the subscriber logs it and drops the message.
#[derive(Debug, Clone, Error)]
pub enum EnvelopeError {
    #[error("Envelope is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Envelope has no event type")]
    MissingType,

    #[error("Unknown event type: {0}")]
    UnknownType(String),

    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_uses_backend_message() {
        let err = RunError::failed(Some("infeasible"));
        assert!(matches!(&err, RunError::RunFailed { message } if message == "infeasible"));
        assert_eq!(err.to_string(), "Run failed: infeasible");
    }

    #[test]
    fn test_failed_falls_back_to_generic_message() {
        for missing in [None, Some(""), Some("   ")] {
            let err = RunError::failed(missing);
            assert!(
                matches!(&err, RunError::RunFailed { message } if message == RunError::GENERIC_FAILURE)
            );
        }
    }

    #[test]
    fn test_status_error_message_includes_status_text() {
        let err = TransportError::Status {
            status: 503,
            status_text: "Service Unavailable".to_string(),
            url: "http://solver/runs".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 503 Service Unavailable from http://solver/runs"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let err = TransportError::Status {
            status: 409,
            status_text: "Conflict".to_string(),
            url: "http://solver/runs/r/cancel".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!RunError::from(err).is_retryable());
    }

    #[test]
    fn test_terminal_kinds_are_not_retryable() {
        assert!(!RunError::RunCancelled.is_retryable());
        assert!(!RunError::ResultUnavailable { observations: 6 }.is_retryable());
        assert_eq!(RunError::RunCancelled.kind(), "run_cancelled");
    }
}
