//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [server] section
    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = section.get("base_url") {
            let v = v.trim();
            if !is_http_url(v) {
                return Err(invalid(
                    "server",
                    "base_url",
                    v,
                    "must be a URL starting with 'http://' or 'https://'",
                ));
            }
            config.server.base_url = v.to_string();
        }
        if let Some(v) = section.get("api_token") {
            let v = v.trim();
            if !v.is_empty() {
                config.server.api_token = Some(v.to_string());
            }
        }
        if let Some(v) = section.get("request_timeout_secs") {
            config.server.request_timeout_secs =
                parse_positive("server", "request_timeout_secs", v, "seconds")?;
        }
    }

    // [run] section
    if let Some(section) = ini.section(Some("run")) {
        if let Some(v) = section.get("timeout_secs") {
            config.run.timeout_secs = parse_positive("run", "timeout_secs", v, "seconds")?;
        }
        if let Some(v) = section.get("grace_secs") {
            config.run.grace_secs = parse_number("run", "grace_secs", v, "must be an integer (seconds)")?;
        }
    }

    // [poll] section
    if let Some(section) = ini.section(Some("poll")) {
        if let Some(v) = section.get("initial_delay_ms") {
            config.poll.initial_delay_ms =
                parse_positive("poll", "initial_delay_ms", v, "milliseconds")?;
        }
        if let Some(v) = section.get("max_delay_ms") {
            config.poll.max_delay_ms = parse_positive("poll", "max_delay_ms", v, "milliseconds")?;
        }
        if let Some(v) = section.get("multiplier") {
            let multiplier: f64 =
                parse_number("poll", "multiplier", v, "must be a number >= 1.0")?;
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(invalid("poll", "multiplier", v, "must be a number >= 1.0"));
            }
            config.poll.multiplier = multiplier;
        }
        if let Some(v) = section.get("materialize_delay_ms") {
            config.poll.materialize_delay_ms =
                parse_positive("poll", "materialize_delay_ms", v, "milliseconds")?;
        }
        if let Some(v) = section.get("max_materialize_retries") {
            config.poll.max_materialize_retries = parse_number(
                "poll",
                "max_materialize_retries",
                v,
                "must be a non-negative integer",
            )?;
        }
        if config.poll.max_delay_ms < config.poll.initial_delay_ms {
            return Err(invalid(
                "poll",
                "max_delay_ms",
                &config.poll.max_delay_ms.to_string(),
                "must not be smaller than initial_delay_ms",
            ));
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_positive(
    section: &str,
    key: &str,
    value: &str,
    unit: &str,
) -> Result<u64, ConfigFileError> {
    let reason = format!("must be a positive integer ({})", unit);
    match parse_number::<u64>(section, key, value, &reason)? {
        0 => Err(invalid(section, key, value, &reason)),
        n => Ok(n),
    }
}

pub(super) fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
