//! User configuration for solverun.
//!
//! Settings live in `~/.solverun/config.ini`:
//!
//! ```ini
//! [server]
//! base_url = http://localhost:8000
//! api_token =
//! request_timeout_secs = 30
//!
//! [run]
//! timeout_secs = 300
//! grace_secs = 60
//!
//! [poll]
//! initial_delay_ms = 250
//! max_delay_ms = 1500
//! multiplier = 1.5
//! materialize_delay_ms = 100
//! max_materialize_retries = 5
//!
//! [logging]
//! file = ~/.solverun/solverun.log
//! ```
//!
//! Missing keys fall back to defaults. [`ConfigFile::poll_policy`],
//! [`ConfigFile::run_timeout`] and [`ConfigFile::client_config`] turn the
//! file into the runtime types used by [`crate::run`].

mod defaults;
mod file;
mod keys;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use keys::{ConfigKey, ConfigKeyError};
pub use settings::{ConfigFile, LoggingSettings, PollSettings, RunSettings, ServerSettings};
