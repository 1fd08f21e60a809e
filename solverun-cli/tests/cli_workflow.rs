//! Integration tests for the CLI.
//!
//! These tests run the built `solverun` binary against a temporary home
//! directory so the user's real configuration is never touched.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Run a CLI command with `home` as the home directory and capture output.
fn run_cli(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_solverun"))
        .args(args)
        .env("HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command")
}

/// Assert a command succeeded.
fn assert_success(output: &Output, context: &str) {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        panic!("{} failed:\nstdout: {}\nstderr: {}", context, stdout, stderr);
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// =============================================================================
// Config Commands
// =============================================================================

#[test]
fn test_config_init_creates_file() {
    let home = TempDir::new().unwrap();

    let output = run_cli(home.path(), &["config", "init"]);
    assert_success(&output, "config init");

    let path = home.path().join(".solverun").join("config.ini");
    assert!(path.exists(), "config.ini should exist");
    let content = fs::read_to_string(&path).unwrap();
    for section in ["[server]", "[run]", "[poll]", "[logging]"] {
        assert!(content.contains(section), "missing {}", section);
    }

    let again = run_cli(home.path(), &["config", "init"]);
    assert_success(&again, "second config init");
    assert!(stdout(&again).contains("already exists"));
}

#[test]
fn test_config_path_points_into_home() {
    let home = TempDir::new().unwrap();

    let output = run_cli(home.path(), &["config", "path"]);
    assert_success(&output, "config path");
    assert_eq!(
        stdout(&output).trim(),
        home.path().join(".solverun/config.ini").display().to_string()
    );
}

#[test]
fn test_config_set_then_get() {
    let home = TempDir::new().unwrap();

    let set = run_cli(home.path(), &["config", "set", "poll.max_delay_ms", "3000"]);
    assert_success(&set, "config set");

    let get = run_cli(home.path(), &["config", "get", "poll.max_delay_ms"]);
    assert_success(&get, "config get");
    assert_eq!(stdout(&get).trim(), "3000");
}

#[test]
fn test_config_set_rejects_invalid_value() {
    let home = TempDir::new().unwrap();

    let output = run_cli(home.path(), &["config", "set", "poll.multiplier", "0.5"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("poll.multiplier"));
    assert!(!home.path().join(".solverun/config.ini").exists());
}

#[test]
fn test_config_get_unknown_key() {
    let home = TempDir::new().unwrap();

    let output = run_cli(home.path(), &["config", "get", "server.port"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Unknown configuration key"));
}

#[test]
fn test_config_list_masks_token() {
    let home = TempDir::new().unwrap();

    assert_success(
        &run_cli(home.path(), &["config", "set", "server.api_token", "hunter2"]),
        "config set token",
    );
    let output = run_cli(home.path(), &["config", "list"]);
    assert_success(&output, "config list");

    let listing = stdout(&output);
    assert!(listing.contains("[poll]"));
    assert!(listing.contains("api_token = ********"));
    assert!(!listing.contains("hunter2"));
}

// =============================================================================
// Run Commands
// =============================================================================

#[test]
fn test_submit_missing_job_file() {
    let home = TempDir::new().unwrap();

    let output = run_cli(home.path(), &["submit", "/nonexistent/job.json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to read job file"));
}

#[test]
fn test_submit_rejects_non_object_job() {
    let home = TempDir::new().unwrap();
    let job = home.path().join("job.json");
    fs::write(&job, "[1, 2, 3]").unwrap();

    let output = run_cli(home.path(), &["submit", job.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("expected a JSON object"));
}

#[test]
fn test_status_against_unreachable_server() {
    let home = TempDir::new().unwrap();

    let output = run_cli(
        home.path(),
        &["status", "run-1", "--url", "http://127.0.0.1:9"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Could not reach the solver"));
}

#[test]
fn test_debug_logs_stay_off_stdout() {
    let home = TempDir::new().unwrap();

    let output = run_cli(
        home.path(),
        &["--debug", "status", "run-1", "--url", "http://127.0.0.1:9"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "");
    assert!(stderr(&output).contains("solverun CLI starting"));
}
