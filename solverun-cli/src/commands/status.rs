//! Status command - fetch a run's status once and print it as JSON.

use solverun::run::RunStatusClient;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the status command.
pub fn run(run_id: &str, url: Option<String>, debug: bool) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(debug)?;
    runner.log_startup("status");

    let client = runner.client(url.as_deref())?;
    let status = runner.block_on(client.get_run_status(run_id))?;

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
