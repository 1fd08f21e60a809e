//! Configuration key access and validation.
//!
//! This module provides a type-safe interface for getting and setting
//! configuration values by key name, with validation via the Specification Pattern.

use std::str::FromStr;
use thiserror::Error;

use super::file::ConfigFile;
use super::parser::{expand_tilde, is_http_url};
use super::writer::path_to_string;

/// Errors that can occur when getting or setting configuration values.
#[derive(Debug, Error)]
pub enum ConfigKeyError {
    /// Unknown configuration key.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    /// Validation failed for the value.
    #[error("Invalid value for {key}: {reason}")]
    ValidationFailed { key: String, reason: String },
}

/// Supported configuration keys.
///
/// Each key maps to a specific field in [`ConfigFile`] and knows how to
/// get and set its value with proper validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    // Server settings
    ServerBaseUrl,
    ServerApiToken,
    ServerRequestTimeoutSecs,

    // Run settings
    RunTimeoutSecs,
    RunGraceSecs,

    // Poll settings
    PollInitialDelayMs,
    PollMaxDelayMs,
    PollMultiplier,
    PollMaterializeDelayMs,
    PollMaxMaterializeRetries,

    // Logging settings
    LoggingFile,
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == lower)
            .ok_or_else(|| ConfigKeyError::UnknownKey(s.to_string()))
    }
}

impl ConfigKey {
    /// Get the canonical key name (e.g., "poll.max_delay_ms").
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::ServerBaseUrl => "server.base_url",
            ConfigKey::ServerApiToken => "server.api_token",
            ConfigKey::ServerRequestTimeoutSecs => "server.request_timeout_secs",
            ConfigKey::RunTimeoutSecs => "run.timeout_secs",
            ConfigKey::RunGraceSecs => "run.grace_secs",
            ConfigKey::PollInitialDelayMs => "poll.initial_delay_ms",
            ConfigKey::PollMaxDelayMs => "poll.max_delay_ms",
            ConfigKey::PollMultiplier => "poll.multiplier",
            ConfigKey::PollMaterializeDelayMs => "poll.materialize_delay_ms",
            ConfigKey::PollMaxMaterializeRetries => "poll.max_materialize_retries",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// Get the section name (e.g., "poll").
    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or("")
    }

    /// Get the key name within the section (e.g., "max_delay_ms").
    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or(self.name())
    }

    /// Get the value from a config file as a string.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::ServerBaseUrl => config.server.base_url.clone(),
            ConfigKey::ServerApiToken => config.server.api_token.clone().unwrap_or_default(),
            ConfigKey::ServerRequestTimeoutSecs => config.server.request_timeout_secs.to_string(),
            ConfigKey::RunTimeoutSecs => config.run.timeout_secs.to_string(),
            ConfigKey::RunGraceSecs => config.run.grace_secs.to_string(),
            ConfigKey::PollInitialDelayMs => config.poll.initial_delay_ms.to_string(),
            ConfigKey::PollMaxDelayMs => config.poll.max_delay_ms.to_string(),
            ConfigKey::PollMultiplier => config.poll.multiplier.to_string(),
            ConfigKey::PollMaterializeDelayMs => config.poll.materialize_delay_ms.to_string(),
            ConfigKey::PollMaxMaterializeRetries => {
                config.poll.max_materialize_retries.to_string()
            }
            ConfigKey::LoggingFile => path_to_string(&config.logging.file),
        }
    }

    /// Set the value in a config file.
    ///
    /// Validates the value according to the key's specification before setting.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        let value = value.trim();
        self.validate(value)?;
        self.apply(config, value)
            .map_err(|reason| ConfigKeyError::ValidationFailed {
                key: self.name().to_string(),
                reason,
            })
    }

    /// Validate a value without setting it.
    pub fn validate(&self, value: &str) -> Result<(), ConfigKeyError> {
        self.specification()
            .is_satisfied_by(value)
            .map_err(|reason| ConfigKeyError::ValidationFailed {
                key: self.name().to_string(),
                reason,
            })
    }

    fn apply(&self, config: &mut ConfigFile, value: &str) -> Result<(), String> {
        match self {
            ConfigKey::ServerBaseUrl => config.server.base_url = value.to_string(),
            ConfigKey::ServerApiToken => {
                config.server.api_token = (!value.is_empty()).then(|| value.to_string());
            }
            ConfigKey::ServerRequestTimeoutSecs => {
                config.server.request_timeout_secs = parse(value)?;
            }
            ConfigKey::RunTimeoutSecs => config.run.timeout_secs = parse(value)?,
            ConfigKey::RunGraceSecs => config.run.grace_secs = parse(value)?,
            ConfigKey::PollInitialDelayMs => {
                let delay = parse(value)?;
                if delay > config.poll.max_delay_ms {
                    return Err(format!(
                        "must not exceed poll.max_delay_ms ({})",
                        config.poll.max_delay_ms
                    ));
                }
                config.poll.initial_delay_ms = delay;
            }
            ConfigKey::PollMaxDelayMs => {
                let delay = parse(value)?;
                if delay < config.poll.initial_delay_ms {
                    return Err(format!(
                        "must not be smaller than poll.initial_delay_ms ({})",
                        config.poll.initial_delay_ms
                    ));
                }
                config.poll.max_delay_ms = delay;
            }
            ConfigKey::PollMultiplier => config.poll.multiplier = parse(value)?,
            ConfigKey::PollMaterializeDelayMs => config.poll.materialize_delay_ms = parse(value)?,
            ConfigKey::PollMaxMaterializeRetries => {
                config.poll.max_materialize_retries = parse(value)?;
            }
            ConfigKey::LoggingFile => config.logging.file = expand_tilde(value),
        }
        Ok(())
    }

    /// Get the validation specification for this key.
    fn specification(&self) -> Box<dyn ValueSpecification> {
        match self {
            ConfigKey::ServerBaseUrl => Box::new(UrlSpec),
            ConfigKey::ServerApiToken => Box::new(AnyStringSpec),
            ConfigKey::ServerRequestTimeoutSecs => Box::new(PositiveIntegerSpec),
            ConfigKey::RunTimeoutSecs => Box::new(PositiveIntegerSpec),
            ConfigKey::RunGraceSecs => Box::new(NonNegativeIntegerSpec),
            ConfigKey::PollInitialDelayMs => Box::new(PositiveIntegerSpec),
            ConfigKey::PollMaxDelayMs => Box::new(PositiveIntegerSpec),
            ConfigKey::PollMultiplier => Box::new(MultiplierSpec),
            ConfigKey::PollMaterializeDelayMs => Box::new(PositiveIntegerSpec),
            ConfigKey::PollMaxMaterializeRetries => Box::new(NonNegativeIntegerSpec),
            ConfigKey::LoggingFile => Box::new(PathSpec),
        }
    }

    /// Get all supported configuration keys.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::ServerBaseUrl,
            ConfigKey::ServerApiToken,
            ConfigKey::ServerRequestTimeoutSecs,
            ConfigKey::RunTimeoutSecs,
            ConfigKey::RunGraceSecs,
            ConfigKey::PollInitialDelayMs,
            ConfigKey::PollMaxDelayMs,
            ConfigKey::PollMultiplier,
            ConfigKey::PollMaterializeDelayMs,
            ConfigKey::PollMaxMaterializeRetries,
            ConfigKey::LoggingFile,
        ]
    }

    /// Whether `get` output should be masked when listed.
    pub fn is_secret(&self) -> bool {
        matches!(self, ConfigKey::ServerApiToken)
    }
}

fn parse<T: FromStr>(value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("cannot parse '{}'", value))
}

// ============================================================================
// Value Specifications (Specification Pattern)
// ============================================================================

/// Trait for value validation specifications.
trait ValueSpecification {
    /// Check if the value satisfies this specification.
    /// Returns Ok(()) if valid, Err(reason) if invalid.
    fn is_satisfied_by(&self, value: &str) -> Result<(), String>;
}

/// Specification that accepts any string value.
struct AnyStringSpec;

impl ValueSpecification for AnyStringSpec {
    fn is_satisfied_by(&self, _value: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Specification for integers greater than zero.
struct PositiveIntegerSpec;

impl ValueSpecification for PositiveIntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err("must be a positive integer".to_string()),
        }
    }
}

/// Specification for integers including zero.
struct NonNegativeIntegerSpec;

impl ValueSpecification for NonNegativeIntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        value
            .parse::<u32>()
            .map(|_| ())
            .map_err(|_| "must be a non-negative integer".to_string())
    }
}

/// Specification for a backoff multiplier.
struct MultiplierSpec;

impl ValueSpecification for MultiplierSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<f64>() {
            Ok(n) if n.is_finite() && n >= 1.0 => Ok(()),
            _ => Err("must be a number >= 1.0".to_string()),
        }
    }
}

/// Specification for path values (non-empty).
struct PathSpec;

impl ValueSpecification for PathSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            Err("must be a valid path".to_string())
        } else {
            Ok(())
        }
    }
}

/// Specification for required HTTP URLs.
struct UrlSpec;

impl ValueSpecification for UrlSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if is_http_url(value) {
            Ok(())
        } else {
            Err("must be a URL starting with 'http://' or 'https://'".to_string())
        }
    }
}
