//! Launches runs and wires their push and poll channels together.
//!
//! ```text
//!                 create_run
//! RunOrchestrator ──────────► run_id
//!                               │
//!              ┌────────────────┴────────────────┐
//!              ▼                                 ▼
//!       PushSubscriber                        PollLoop
//!   (snapshot/final events)           (status + backoff + deadline)
//!              │                                 │
//!              └──► AlternativeTracker ◄─────────┤
//!              └──► ResultReconciler  ◄──────────┘
//!                          │
//!                          ▼
//!                  RunHandle::wait()
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::client::RunStatusClient;
use super::error::RunError;
use super::handle::{RunHandle, RunPhase, Teardown};
use super::observer::{ObserverSet, RunObserver};
use super::poll::{PollLoop, PollPolicy};
use super::reconciler::ResultReconciler;
use super::stream::{ChannelStatus, PushHandlers, PushSubscriber, PushTransport};
use super::tracker::AlternativeTracker;
use super::types::{AlternativeSource, JobSpec, SolveResult, StreamEvent};

/// Default soft timeout for a run, before the poll grace period.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

/// Feeds push events into a run's shared state.
struct RunSink {
    run_id: String,
    reconciler: Arc<ResultReconciler>,
    tracker: Arc<AlternativeTracker>,
    observers: Arc<ObserverSet>,
}

impl PushHandlers for RunSink {
    fn on_snapshot(&self, event: &StreamEvent) {
        if let Some(result) = event.result() {
            let alternative =
                self.tracker
                    .record_result(result.clone(), event.received_at, AlternativeSource::Push);
            debug!(
                run_id = %self.run_id,
                alternative = %alternative.id,
                scheduled = result.scheduled,
                total = result.total,
                "Snapshot received"
            );
            self.observers.snapshot(result);
        }
    }

    fn on_final(&self, event: &StreamEvent) {
        if let Some(result) = event.result() {
            self.observers.final_result(result);
            if self.reconciler.try_set(result.clone()) {
                info!(run_id = %self.run_id, channel = "push", "Result reconciled");
            } else {
                debug!(run_id = %self.run_id, "Final event arrived after reconciliation, dropped");
            }
        }
    }

    fn on_heartbeat(&self, event: &StreamEvent) {
        trace!(run_id = %self.run_id, "Heartbeat");
        if let Some(payload) = event.metadata() {
            self.observers.heartbeat(payload);
        }
    }

    fn on_meta(&self, event: &StreamEvent) {
        if let Some(payload) = event.metadata() {
            debug!(run_id = %self.run_id, meta = %payload, "Run metadata");
            self.observers.meta(payload);
        }
    }

    fn on_solver_error(&self, event: &StreamEvent) {
        if let Some(payload) = event.metadata() {
            warn!(run_id = %self.run_id, payload = %payload, "Solver reported an error");
            self.observers.solver_error(payload);
        }
    }

    fn on_channel_status(&self, status: ChannelStatus) {
        debug!(run_id = %self.run_id, status = %status, "Push channel status");
        self.observers.channel_status(status);
    }
}

/// Starts runs against one backend.
pub struct RunOrchestrator<C: RunStatusClient, T: PushTransport> {
    client: Arc<C>,
    transport: Arc<T>,
    policy: PollPolicy,
    timeout: Duration,
}

impl<C, T> RunOrchestrator<C, T>
where
    C: RunStatusClient + 'static,
    T: PushTransport + 'static,
{
    pub fn new(client: Arc<C>, transport: Arc<T>) -> Self {
        Self {
            client,
            transport,
            policy: PollPolicy::default(),
            timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the soft timeout; the poll grace period is added on top.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Launches a run and starts both channels.
    ///
    /// Returns once the backend has assigned a run id. A launch failure is
    /// returned as [`RunError::Transport`].
    pub async fn start(&self, job: &JobSpec) -> Result<RunHandle<C>, RunError> {
        self.launch(job, ObserverSet::new()).await
    }

    /// Like [`start`](Self::start), with an observer registered before the
    /// push channel opens so no event is missed.
    pub async fn start_observed(
        &self,
        job: &JobSpec,
        observer: Arc<dyn RunObserver>,
    ) -> Result<RunHandle<C>, RunError> {
        let observers = ObserverSet::new();
        observers.add(observer);
        self.launch(job, observers).await
    }

    /// Launches a run and waits for its outcome.
    pub async fn run(
        &self,
        job: &JobSpec,
        observer: Arc<dyn RunObserver>,
    ) -> Result<SolveResult, RunError> {
        let mut handle = self.start_observed(job, observer).await?;
        handle.wait().await
    }

    async fn launch(&self, job: &JobSpec, observers: ObserverSet) -> Result<RunHandle<C>, RunError> {
        info!(phase = %RunPhase::Launching, kind = ?job.kind, "Launching run");

        let created = self.client.create_run(job).await.map_err(|e| {
            warn!(error = %e, "Failed to launch run");
            RunError::Transport(e)
        })?;
        let run_id = created.run_id;

        let reconciler = Arc::new(ResultReconciler::new());
        let tracker = Arc::new(AlternativeTracker::new());
        let observers = Arc::new(observers);

        let sink = Arc::new(RunSink {
            run_id: run_id.clone(),
            reconciler: Arc::clone(&reconciler),
            tracker: Arc::clone(&tracker),
            observers: Arc::clone(&observers),
        });
        let push = PushSubscriber::new(Arc::clone(&self.transport)).open(&run_id, sink);

        let poll_token = CancellationToken::new();
        let poll_loop = PollLoop::new(
            Arc::clone(&self.client),
            run_id.clone(),
            self.policy.clone(),
            self.timeout,
            Arc::clone(&reconciler),
            Arc::clone(&tracker),
            poll_token.clone(),
        );
        let teardown = Arc::new(Teardown::new(run_id.clone(), poll_token, push));

        // Any terminal poll outcome closes the push channel, even if nobody waits.
        let poll_teardown = Arc::clone(&teardown);
        let poll = tokio::spawn(async move {
            let outcome = poll_loop.run().await;
            poll_teardown.run();
            outcome
        });

        info!(
            run_id = %run_id,
            status = %created.status,
            phase = %RunPhase::Streaming,
            timeout_secs = self.timeout.as_secs(),
            "Run launched"
        );

        Ok(RunHandle::new(
            run_id,
            Arc::clone(&self.client),
            reconciler,
            tracker,
            observers,
            teardown,
            poll,
        ))
    }
}
