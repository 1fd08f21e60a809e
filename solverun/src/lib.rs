//! solverun - Client runtime for remote constraint-solver runs
//!
//! This library submits jobs to a remote solver service and follows each run
//! to a single reconciled outcome. Results arrive over two channels at once:
//! a push stream of server-sent events and an HTTP status poll. Whichever
//! produces a usable result first wins; the other is torn down.
//!
//! # High-Level API
//!
//! ```ignore
//! use solverun::run::{ClientConfig, HttpOrchestrator, JobSpec};
//!
//! let orchestrator = HttpOrchestrator::connect(ClientConfig::new("http://localhost:8000"))?;
//! let mut handle = orchestrator.start(&JobSpec::solve(job_json)).await?;
//!
//! handle.on_snapshot(|result| println!("{} scheduled", result.scheduled));
//! let result = handle.wait().await?;
//! ```

pub mod config;
pub mod logging;
pub mod run;

/// Version of the solverun library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
