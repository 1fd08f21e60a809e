//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`cancel`] - Request cancellation of a run
//! - [`config`] - Configuration management (get, set, list, path, init)
//! - [`status`] - One-shot run status fetch
//! - [`submit`] - Launch a job and follow it to its result

pub mod cancel;
pub mod config;
pub mod status;
pub mod submit;
