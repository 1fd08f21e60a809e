//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let api_token = config.server.api_token.as_deref().unwrap_or("");

    format!(
        r#"[server]
; Base URL of the solver's job-control API
base_url = {}
; Bearer token sent with every request (leave empty if the server is open)
api_token = {}
; Timeout in seconds for a single request (default: 30)
request_timeout_secs = {}

[run]
; Soft timeout in seconds requested for each run (default: 300)
timeout_secs = {}
; Extra seconds allowed on top of the timeout before giving up (default: 60)
grace_secs = {}

[poll]
; Status polling backs off from initial_delay_ms by multiplier up to max_delay_ms
initial_delay_ms = {}
max_delay_ms = {}
multiplier = {}
; A run reported as succeeded may briefly have no result attached.
; Poll every materialize_delay_ms, and fail after max_materialize_retries
; consecutive result-less observations.
materialize_delay_ms = {}
max_materialize_retries = {}

[logging]
; Log file, cleared at the start of every session
file = {}
"#,
        config.server.base_url,
        api_token,
        config.server.request_timeout_secs,
        config.run.timeout_secs,
        config.run.grace_secs,
        config.poll.initial_delay_ms,
        config.poll.max_delay_ms,
        config.poll.multiplier,
        config.poll.materialize_delay_ms,
        config.poll.max_materialize_retries,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing home dir to ~.
pub(super) fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::super::settings::ConfigFile;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        let mut config = ConfigFile::default();
        config.server.base_url = "https://solver.example.com".to_string();
        config.server.api_token = Some("test-token".to_string());
        config.run.timeout_secs = 90;
        config.poll.multiplier = 2.0;
        config.poll.max_materialize_retries = 8;

        config.save_to(&config_path).unwrap();
        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_default_file_lists_every_section() {
        let content = to_config_string(&ConfigFile::default());
        for section in ["[server]", "[run]", "[poll]", "[logging]"] {
            assert!(content.contains(section), "missing {}", section);
        }
        assert!(content.contains("multiplier = 1.5"));
    }

    #[test]
    fn test_path_collapses_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path_to_string(&home.join("x.log")), "~/x.log");
        }
        assert_eq!(path_to_string(Path::new("/var/x.log")), "/var/x.log");
    }
}
