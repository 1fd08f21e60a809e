//! Run handle for waiting, cancelling and inspecting a launched run.
//!
//! The [`RunHandle`] is returned by [`RunOrchestrator::start`]. It owns the
//! run's poll task and push subscription; dropping it tears both down.
//!
//! # Example
//!
//! ```ignore
//! use solverun::run::{JobSpec, RunOrchestrator};
//!
//! let mut handle = orchestrator.start(&JobSpec::solve(payload)).await?;
//! handle.on_snapshot(|result| println!("{} scheduled", result.scheduled));
//!
//! // Cancel from another task
//! let canceller = handle.canceller();
//! tokio::spawn(async move { canceller.cancel().await });
//!
//! let result = handle.wait().await?;
//! ```
//!
//! [`RunOrchestrator::start`]: super::RunOrchestrator::start

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::RunStatusClient;
use super::error::RunError;
use super::observer::{FinalFn, ObserverSet, RunObserver, SnapshotFn};
use super::reconciler::{Outcome, ResultReconciler};
use super::stream::CloseHandle;
use super::tracker::{AlternativeTracker, RankCriteria};
use super::types::{Alternative, SolveResult};

/// Where a run is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RunPhase {
    /// `create_run` has not returned yet. Only seen in launch logs, since
    /// a [`RunHandle`] exists only after the run id is assigned.
    #[default]
    Launching,
    /// Push and poll channels are live.
    Streaming,
    Succeeded,
    /// Failed, timed out, or the result never materialized.
    Failed,
    Cancelled,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launching => write!(f, "Launching"),
            Self::Streaming => write!(f, "Streaming"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Stops both channels of a run. Safe to trigger any number of times.
pub(crate) struct Teardown {
    run_id: String,
    poll: CancellationToken,
    push: CloseHandle,
    done: AtomicBool,
}

impl Teardown {
    pub(crate) fn new(run_id: String, poll: CancellationToken, push: CloseHandle) -> Self {
        Self {
            run_id,
            poll,
            push,
            done: AtomicBool::new(false),
        }
    }

    pub(crate) fn run(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        self.poll.cancel();
        self.push.close();
        debug!(run_id = %self.run_id, "Run channels torn down");
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

/// Cancels a run from any task.
pub struct RunCanceller<C: RunStatusClient> {
    run_id: String,
    client: Arc<C>,
    reconciler: Arc<ResultReconciler>,
    teardown: Arc<Teardown>,
}

impl<C: RunStatusClient> Clone for RunCanceller<C> {
    fn clone(&self) -> Self {
        Self {
            run_id: self.run_id.clone(),
            client: Arc::clone(&self.client),
            reconciler: Arc::clone(&self.reconciler),
            teardown: Arc::clone(&self.teardown),
        }
    }
}

impl<C: RunStatusClient> RunCanceller<C> {
    /// Cancels the run.
    ///
    /// If no result has been reconciled yet, the run settles as cancelled and
    /// `wait` returns [`RunError::RunCancelled`]. Either way both channels are
    /// torn down and a backend cancellation is requested; its failure is
    /// only logged.
    pub async fn cancel(&self) {
        if self.reconciler.try_cancel() {
            info!(run_id = %self.run_id, "Run cancelled");
        } else {
            debug!(run_id = %self.run_id, "Cancel after reconciliation, result kept");
        }
        self.teardown.run();

        if let Err(e) = self.client.cancel_run(&self.run_id).await {
            warn!(run_id = %self.run_id, error = %e, "Backend rejected cancellation");
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// Handle to a launched run.
pub struct RunHandle<C: RunStatusClient> {
    run_id: String,
    client: Arc<C>,
    reconciler: Arc<ResultReconciler>,
    tracker: Arc<AlternativeTracker>,
    observers: Arc<ObserverSet>,
    teardown: Arc<Teardown>,
    poll: Option<JoinHandle<Result<SolveResult, RunError>>>,
    resolved: Option<Result<SolveResult, RunError>>,
}

impl<C: RunStatusClient> RunHandle<C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        run_id: String,
        client: Arc<C>,
        reconciler: Arc<ResultReconciler>,
        tracker: Arc<AlternativeTracker>,
        observers: Arc<ObserverSet>,
        teardown: Arc<Teardown>,
        poll: JoinHandle<Result<SolveResult, RunError>>,
    ) -> Self {
        Self {
            run_id,
            client,
            reconciler,
            tracker,
            observers,
            teardown,
            poll: Some(poll),
            resolved: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Waits for the run's single outcome.
    ///
    /// Resolves as soon as either channel reconciles a result or the poll
    /// loop ends with an error. Both channels are torn down before this
    /// returns. Calling it again returns the same outcome.
    pub async fn wait(&mut self) -> Result<SolveResult, RunError> {
        if let Some(resolved) = &self.resolved {
            return resolved.clone();
        }

        let resolved = match self.poll.as_mut() {
            Some(poll) => {
                let polled = tokio::select! {
                    outcome = self.reconciler.settled() => Err(outcome),
                    joined = poll => Ok(joined),
                };
                match polled {
                    Err(outcome) => outcome_result(outcome),
                    Ok(joined) => {
                        self.poll = None;
                        let polled = joined.unwrap_or_else(|e| {
                            Err(RunError::RunFailed {
                                message: format!("poll task ended abnormally: {}", e),
                            })
                        });
                        // A reconciled value takes precedence over a poll
                        // error that raced it.
                        match (polled, self.reconciler.get()) {
                            (Err(_), Some(outcome)) => outcome_result(outcome),
                            (polled, _) => polled,
                        }
                    }
                }
            }
            None => self
                .reconciler
                .get()
                .map(outcome_result)
                .unwrap_or(Err(RunError::RunCancelled)),
        };

        self.teardown.run();
        match &resolved {
            Ok(result) => info!(
                run_id = %self.run_id,
                scheduled = result.scheduled,
                total = result.total,
                "Run succeeded"
            ),
            Err(e) => info!(run_id = %self.run_id, kind = e.kind(), error = %e, "Run ended"),
        }
        self.resolved = Some(resolved.clone());
        resolved
    }

    /// Cancels the run. See [`RunCanceller::cancel`].
    pub async fn cancel(&self) {
        self.canceller().cancel().await
    }

    /// Returns a cloneable canceller for use from other tasks.
    pub fn canceller(&self) -> RunCanceller<C> {
        RunCanceller {
            run_id: self.run_id.clone(),
            client: Arc::clone(&self.client),
            reconciler: Arc::clone(&self.reconciler),
            teardown: Arc::clone(&self.teardown),
        }
    }

    /// Current lifecycle phase; never [`RunPhase::Launching`].
    pub fn phase(&self) -> RunPhase {
        match &self.resolved {
            Some(Ok(_)) => return RunPhase::Succeeded,
            Some(Err(RunError::RunCancelled)) => return RunPhase::Cancelled,
            Some(Err(_)) => return RunPhase::Failed,
            None => {}
        }
        match self.reconciler.get() {
            Some(Outcome::Succeeded(_)) => RunPhase::Succeeded,
            Some(Outcome::Cancelled) => RunPhase::Cancelled,
            None => RunPhase::Streaming,
        }
    }

    /// Reconciled result, if one has been accepted.
    pub fn result(&self) -> Option<SolveResult> {
        self.reconciler.result()
    }

    /// Every solution seen so far, in observation order.
    pub fn alternatives(&self) -> Vec<Alternative> {
        self.tracker.snapshot()
    }

    pub fn best_alternative(&self, criteria: &RankCriteria) -> Option<Alternative> {
        self.tracker.best(criteria)
    }

    pub fn observe(&self, observer: Arc<dyn RunObserver>) {
        self.observers.add(observer);
    }

    /// Calls `f` for every snapshot (including the final one) from now on.
    pub fn on_snapshot<F>(&self, f: F)
    where
        F: Fn(&SolveResult) + Send + Sync + 'static,
    {
        self.observe(Arc::new(SnapshotFn(f)));
    }

    /// Calls `f` when the push channel delivers the final result.
    pub fn on_final<F>(&self, f: F)
    where
        F: Fn(&SolveResult) + Send + Sync + 'static,
    {
        self.observe(Arc::new(FinalFn(f)));
    }

    /// Whether the channels have been torn down.
    pub fn is_torn_down(&self) -> bool {
        self.teardown.is_done()
    }
}

impl<C: RunStatusClient> Drop for RunHandle<C> {
    fn drop(&mut self) {
        self.teardown.run();
    }
}

impl<C: RunStatusClient> fmt::Debug for RunHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.run_id)
            .field("phase", &self.phase())
            .field("alternatives", &self.tracker.len())
            .finish()
    }
}

fn outcome_result(outcome: Outcome) -> Result<SolveResult, RunError> {
    match outcome {
        Outcome::Succeeded(result) => Ok(result),
        Outcome::Cancelled => Err(RunError::RunCancelled),
    }
}
