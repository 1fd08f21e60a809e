//! Submit command - launch a job and follow it to its result.
//!
//! Snapshots are reported on stderr as they arrive so stdout carries only
//! the final JSON. Ctrl+C cancels the run.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;
use solverun::run::{HttpOrchestrator, JobKind, JobSpec, RankCriteria, SolveResult};
use tracing::{info, warn};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the submit command.
pub struct SubmitArgs {
    pub job: PathBuf,
    pub kind: Option<JobKind>,
    pub timeout: Option<u64>,
    pub url: Option<String>,
    pub best: bool,
}

/// Run the submit command.
pub fn run(args: SubmitArgs, debug: bool) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(debug)?;
    runner.log_startup("submit");

    let job = load_job(&args.job, args.kind)?;
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| runner.config().run_timeout());
    let orchestrator = runner
        .orchestrator(args.url.as_deref())?
        .with_timeout(timeout);

    let result = runner.block_on(follow(orchestrator, job, timeout, args.best))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Launches the run and waits for it, cancelling on Ctrl+C.
async fn follow(
    orchestrator: HttpOrchestrator,
    job: JobSpec,
    timeout: Duration,
    best: bool,
) -> Result<SolveResult, CliError> {
    let mut handle = orchestrator.start(&job).await?;
    eprintln!(
        "Run {} launched ({:?}, timeout {}s)",
        handle.run_id(),
        job.kind,
        timeout.as_secs()
    );

    handle.on_snapshot(|result| eprintln!("  {}", describe(result)));

    let canceller = handle.canceller();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(run_id = canceller.run_id(), "Interrupted, cancelling run");
            eprintln!("Cancelling run {}...", canceller.run_id());
            canceller.cancel().await;
        }
    });

    let outcome = handle.wait().await;
    interrupt.abort();
    let result = outcome?;

    if !best {
        return Ok(result);
    }
    let alternatives = handle.alternatives().len();
    let best = handle
        .best_alternative(&RankCriteria::default())
        .map(|alternative| alternative.result)
        .unwrap_or(result);
    info!(alternatives, "Reporting best alternative");
    Ok(best)
}

/// Read a job file and resolve its kind.
///
/// The CLI flag wins over the file's own `kind` field; without either the
/// job is a solve.
fn load_job(path: &Path, kind: Option<JobKind>) -> Result<JobSpec, CliError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|error| CliError::JobRead {
        path: display.clone(),
        error,
    })?;
    parse_job(&content, kind).map_err(|reason| CliError::InvalidJob {
        path: display,
        reason,
    })
}

fn parse_job(content: &str, kind: Option<JobKind>) -> Result<JobSpec, String> {
    let mut payload: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let fields = payload
        .as_object_mut()
        .ok_or_else(|| "expected a JSON object".to_string())?;

    let file_kind = match fields.remove("kind") {
        Some(Value::String(s)) => Some(JobKind::from_str(&s)?),
        Some(other) => return Err(format!("'kind' must be a string, found {}", other)),
        None => None,
    };

    Ok(JobSpec::new(kind.or(file_kind).unwrap_or_default(), payload))
}

fn describe(result: &SolveResult) -> String {
    let mut line = format!("snapshot: {}/{} scheduled", result.scheduled, result.total);
    if let Some(score) = &result.secondary {
        line.push_str(&format!(", score {}/{}", score.score, score.possible));
    }
    if !result.status.is_empty() {
        line.push_str(&format!(" [{}]", result.status));
    }
    line
}
