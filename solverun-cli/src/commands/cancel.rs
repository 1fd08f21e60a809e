//! Cancel command - ask the backend to stop a run.

use solverun::run::RunStatusClient;
use tracing::info;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the cancel command.
pub fn run(run_id: &str, url: Option<String>, debug: bool) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(debug)?;
    runner.log_startup("cancel");

    let client = runner.client(url.as_deref())?;
    runner.block_on(client.cancel_run(run_id))?;

    info!(run_id, "Cancellation requested");
    println!("Cancellation requested for run {}", run_id);
    Ok(())
}
