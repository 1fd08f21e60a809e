//! Default values and constants for all configuration settings.
//!
//! Poll timing defaults mirror [`crate::run::PollPolicy::default`].

use super::settings::*;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_GRACE_SECS: u64 = 60;

pub const DEFAULT_INITIAL_DELAY_MS: u64 = 250;
pub const DEFAULT_MAX_DELAY_MS: u64 = 1500;
pub const DEFAULT_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_MATERIALIZE_DELAY_MS: u64 = 100;
pub const DEFAULT_MAX_MATERIALIZE_RETRIES: u32 = 5;

pub const DEFAULT_LOG_FILE_NAME: &str = "solverun.log";

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
            grace_secs: DEFAULT_GRACE_SECS,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            multiplier: DEFAULT_MULTIPLIER,
            materialize_delay_ms: DEFAULT_MATERIALIZE_DELAY_MS,
            max_materialize_retries: DEFAULT_MAX_MATERIALIZE_RETRIES,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: super::file::config_directory().join(DEFAULT_LOG_FILE_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::PollPolicy;
    use std::time::Duration;

    #[test]
    fn test_poll_defaults_match_runtime_policy() {
        let settings = PollSettings::default();
        let policy = PollPolicy::default();

        assert_eq!(Duration::from_millis(settings.initial_delay_ms), policy.initial_delay);
        assert_eq!(Duration::from_millis(settings.max_delay_ms), policy.max_delay);
        assert_eq!(settings.multiplier, policy.multiplier);
        assert_eq!(
            Duration::from_millis(settings.materialize_delay_ms),
            policy.materialize_delay
        );
        assert_eq!(settings.max_materialize_retries, policy.max_materialize_retries);
        assert_eq!(Duration::from_secs(DEFAULT_GRACE_SECS), policy.grace);
    }

    #[test]
    fn test_default_log_file_under_config_dir() {
        let logging = LoggingSettings::default();
        assert!(logging.file.ends_with(".solverun/solverun.log"));
    }
}
