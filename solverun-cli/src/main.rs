//! solverun CLI - Command-line interface
//!
//! Submits jobs to a remote solver, follows the run until it resolves and
//! manages the user configuration file.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use solverun::run::JobKind;

use commands::config::ConfigCommands;
use commands::submit::SubmitArgs;

#[derive(Parser)]
#[command(name = "solverun")]
#[command(version = solverun::VERSION)]
#[command(about = "Submit and follow remote solver runs", long_about = None)]
struct Cli {
    /// Enable debug logging regardless of RUST_LOG
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    /// Optimize a schedule
    Solve,
    /// Explain why a schedule cannot be improved
    Explain,
}

impl From<KindArg> for JobKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Solve => JobKind::Solve,
            KindArg::Explain => JobKind::Explain,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a job and wait for its result
    Submit {
        /// Path to the job JSON file
        job: PathBuf,

        /// Job kind (defaults to the file's "kind" field, then solve)
        #[arg(long, value_enum)]
        kind: Option<KindArg>,

        /// Soft run timeout in seconds (grace period is added on top)
        #[arg(long)]
        timeout: Option<u64>,

        /// Solver base URL (overrides server.base_url)
        #[arg(long)]
        url: Option<String>,

        /// Print the best alternative seen instead of the final result
        #[arg(long)]
        best: bool,
    },

    /// Fetch the current status of a run
    Status {
        /// Run identifier
        run_id: String,

        /// Solver base URL (overrides server.base_url)
        #[arg(long)]
        url: Option<String>,
    },

    /// Request cancellation of a run
    Cancel {
        /// Run identifier
        run_id: String,

        /// Solver base URL (overrides server.base_url)
        #[arg(long)]
        url: Option<String>,
    },

    /// View and modify configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Submit {
            job,
            kind,
            timeout,
            url,
            best,
        } => commands::submit::run(
            SubmitArgs {
                job,
                kind: kind.map(JobKind::from),
                timeout,
                url,
                best,
            },
            cli.debug,
        ),
        Commands::Status { run_id, url } => commands::status::run(&run_id, url, cli.debug),
        Commands::Cancel { run_id, url } => commands::cancel::run(&run_id, url, cli.debug),
        Commands::Config(command) => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
