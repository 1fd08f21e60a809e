//! Backstop status polling for a single run.
//!
//! The [`PollLoop`] fetches run status until it observes a terminal state,
//! another channel reconciles the run, or the deadline passes. It runs
//! whether or not the push channel is alive.
//!
//! # Timing
//!
//! - Deadline is `timeout + grace` from the moment the loop starts.
//! - `pending`/`running` and transport failures sleep on an exponential
//!   [`Backoff`] (250ms, x1.5, capped at 1500ms by default).
//! - `succeeded` without a result sleeps a short fixed interval and does not
//!   touch the backoff. More than `max_materialize_retries` consecutive
//!   observations of that state fail the run.
//! - Sleeps end early when the run is reconciled or torn down.
//! - Neither a sleep nor an in-flight status fetch runs past the deadline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::backoff::Backoff;
use super::client::RunStatusClient;
use super::error::RunError;
use super::reconciler::{Outcome, ResultReconciler};
use super::tracker::AlternativeTracker;
use super::types::{AlternativeSource, RunState, SolveResult};

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(1500);
pub const DEFAULT_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_GRACE: Duration = Duration::from_secs(60);
pub const DEFAULT_MATERIALIZE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_MATERIALIZE_RETRIES: u32 = 5;

/// Timing policy for the poll loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Added to the caller's timeout to form the run deadline.
    pub grace: Duration,
    /// Fixed sleep while a `succeeded` status has no result yet.
    pub materialize_delay: Duration,
    /// Consecutive result-less `succeeded` observations tolerated.
    pub max_materialize_retries: u32,
}

impl PollPolicy {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_delay, self.multiplier, self.max_delay)
    }

    /// Total budget for a run with the given soft timeout.
    pub fn budget(&self, timeout: Duration) -> Duration {
        timeout.saturating_add(self.grace)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            grace: DEFAULT_GRACE,
            materialize_delay: DEFAULT_MATERIALIZE_DELAY,
            max_materialize_retries: DEFAULT_MAX_MATERIALIZE_RETRIES,
        }
    }
}

/// Poll loop bound to one run id.
pub struct PollLoop<C: RunStatusClient> {
    client: Arc<C>,
    run_id: String,
    policy: PollPolicy,
    timeout: Duration,
    reconciler: Arc<ResultReconciler>,
    tracker: Arc<AlternativeTracker>,
    teardown: CancellationToken,
}

impl<C: RunStatusClient + 'static> PollLoop<C> {
    pub fn new(
        client: Arc<C>,
        run_id: impl Into<String>,
        policy: PollPolicy,
        timeout: Duration,
        reconciler: Arc<ResultReconciler>,
        tracker: Arc<AlternativeTracker>,
        teardown: CancellationToken,
    ) -> Self {
        Self {
            client,
            run_id: run_id.into(),
            policy,
            timeout,
            reconciler,
            tracker,
            teardown,
        }
    }

    /// Spawns the loop on the current runtime.
    pub fn start(self) -> tokio::task::JoinHandle<Result<SolveResult, RunError>> {
        tokio::spawn(self.run())
    }

    /// Polls until the run resolves.
    pub async fn run(self) -> Result<SolveResult, RunError> {
        let started = Instant::now();
        let deadline = started + self.policy.budget(self.timeout);
        let mut backoff = self.policy.backoff();
        let mut unmaterialized: u32 = 0;
        let mut last_transport_error: Option<String> = None;

        tracing::debug!(
            run_id = %self.run_id,
            timeout_secs = self.timeout.as_secs(),
            grace_secs = self.policy.grace.as_secs(),
            "Poll loop started"
        );

        loop {
            if let Some(resolved) = self.already_resolved() {
                return resolved;
            }
            if Instant::now() >= deadline {
                return Err(self.timed_out(started, last_transport_error));
            }

            let observed = tokio::select! {
                observed = self.client.get_run_status(&self.run_id) => observed,
                _ = tokio::time::sleep_until(deadline) => continue,
                _ = self.teardown.cancelled() => continue,
            };

            if let Some(resolved) = self.already_resolved() {
                return resolved;
            }

            let status = match observed {
                Ok(status) => {
                    last_transport_error = None;
                    status
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::debug!(
                        run_id = %self.run_id,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Status fetch failed, backing off"
                    );
                    last_transport_error = Some(e.to_string());
                    self.pause(delay, deadline).await;
                    continue;
                }
            };

            tracing::trace!(run_id = %self.run_id, status = %status.status, "Polled run status");

            match status.status {
                RunState::Succeeded => match status.result {
                    Some(result) => return self.accept(result),
                    None => {
                        unmaterialized += 1;
                        if unmaterialized > self.policy.max_materialize_retries {
                            tracing::warn!(
                                run_id = %self.run_id,
                                observations = unmaterialized,
                                "Run succeeded but result never materialized"
                            );
                            return Err(RunError::ResultUnavailable {
                                observations: unmaterialized,
                            });
                        }
                        tracing::debug!(
                            run_id = %self.run_id,
                            observations = unmaterialized,
                            "Run succeeded, waiting for result"
                        );
                        self.pause(self.policy.materialize_delay, deadline).await;
                    }
                },
                RunState::Failed => {
                    let error = RunError::failed(status.error.as_deref());
                    tracing::info!(run_id = %self.run_id, error = %error, "Run failed");
                    return Err(error);
                }
                RunState::Cancelled => {
                    tracing::info!(run_id = %self.run_id, "Run cancelled by backend");
                    return Err(RunError::RunCancelled);
                }
                RunState::Pending | RunState::Running => {
                    unmaterialized = 0;
                    let delay = backoff.next_delay();
                    tracing::debug!(
                        run_id = %self.run_id,
                        status = %status.status,
                        delay_ms = delay.as_millis() as u64,
                        "Run in progress"
                    );
                    self.pause(delay, deadline).await;
                }
            }
        }
    }

    fn timed_out(&self, started: Instant, last_transport_error: Option<String>) -> RunError {
        let elapsed = Instant::now().duration_since(started);
        tracing::warn!(
            run_id = %self.run_id,
            elapsed_ms = elapsed.as_millis() as u64,
            last_error = last_transport_error.as_deref().unwrap_or(""),
            "Run deadline exceeded"
        );
        RunError::RunTimedOut {
            elapsed,
            last_transport_error,
        }
    }

    /// Records a polled result and offers it to the reconciler.
    fn accept(&self, result: SolveResult) -> Result<SolveResult, RunError> {
        self.tracker
            .record_result(result.clone(), Utc::now(), AlternativeSource::Poll);
        if self.reconciler.try_set(result.clone()) {
            tracing::info!(run_id = %self.run_id, channel = "poll", "Result reconciled");
            return Ok(result);
        }
        tracing::debug!(run_id = %self.run_id, "Poll result arrived after reconciliation, dropped");
        self.already_resolved().unwrap_or(Ok(result))
    }

    /// Returns the outcome if the run was settled elsewhere or torn down.
    fn already_resolved(&self) -> Option<Result<SolveResult, RunError>> {
        match self.reconciler.get() {
            Some(Outcome::Succeeded(result)) => Some(Ok(result)),
            Some(Outcome::Cancelled) => Some(Err(RunError::RunCancelled)),
            None if self.teardown.is_cancelled() => Some(Err(RunError::RunCancelled)),
            None => None,
        }
    }

    /// Sleeps for `delay`, but never past `deadline`.
    async fn pause(&self, delay: Duration, deadline: Instant) {
        let wake = (Instant::now() + delay).min(deadline);
        tokio::select! {
            _ = tokio::time::sleep_until(wake) => {}
            _ = self.teardown.cancelled() => {}
            _ = self.reconciler.settled() => {}
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::run::error::TransportError;
    use crate::run::types::{JobSpec, RunStatus};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Status client replaying a fixed script of poll responses.
    ///
    /// Once the script is exhausted the last response repeats.
    pub struct ScriptedClient {
        created: RunStatus,
        script: Mutex<VecDeque<Result<RunStatus, TransportError>>>,
        last: Mutex<Result<RunStatus, TransportError>>,
        poll_latency: Duration,
        pub polls: AtomicUsize,
        pub cancels: AtomicUsize,
    }

    impl ScriptedClient {
        pub fn new(script: Vec<Result<RunStatus, TransportError>>) -> Self {
            Self {
                created: RunStatus::new("run-1", RunState::Pending),
                script: Mutex::new(script.into()),
                last: Mutex::new(Ok(RunStatus::new("run-1", RunState::Running))),
                poll_latency: Duration::ZERO,
                polls: AtomicUsize::new(0),
                cancels: AtomicUsize::new(0),
            }
        }

        pub fn with_poll_latency(mut self, latency: Duration) -> Self {
            self.poll_latency = latency;
            self
        }

        pub fn poll_count(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    impl RunStatusClient for ScriptedClient {
        async fn create_run(&self, _job: &JobSpec) -> Result<RunStatus, TransportError> {
            Ok(self.created.clone())
        }

        async fn get_run_status(&self, _run_id: &str) -> Result<RunStatus, TransportError> {
            if !self.poll_latency.is_zero() {
                tokio::time::sleep(self.poll_latency).await;
            }
            self.polls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            match next {
                Some(response) => {
                    *self.last.lock() = response.clone();
                    response
                }
                None => self.last.lock().clone(),
            }
        }

        async fn cancel_run(&self, _run_id: &str) -> Result<(), TransportError> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub fn running() -> Result<RunStatus, TransportError> {
        Ok(RunStatus::new("run-1", RunState::Running))
    }

    pub fn succeeded(result: SolveResult) -> Result<RunStatus, TransportError> {
        Ok(RunStatus::new("run-1", RunState::Succeeded).with_result(result))
    }

    pub fn unmaterialized() -> Result<RunStatus, TransportError> {
        Ok(RunStatus::new("run-1", RunState::Succeeded))
    }

    pub fn network_error() -> Result<RunStatus, TransportError> {
        Err(TransportError::Network("connection reset".to_string()))
    }

    struct Fixture {
        client: Arc<ScriptedClient>,
        reconciler: Arc<ResultReconciler>,
        tracker: Arc<AlternativeTracker>,
        teardown: CancellationToken,
    }

    impl Fixture {
        fn new(script: Vec<Result<RunStatus, TransportError>>) -> Self {
            Self {
                client: Arc::new(ScriptedClient::new(script)),
                reconciler: Arc::new(ResultReconciler::new()),
                tracker: Arc::new(AlternativeTracker::new()),
                teardown: CancellationToken::new(),
            }
        }

        fn poll_loop(&self, timeout: Duration) -> PollLoop<ScriptedClient> {
            PollLoop::new(
                Arc::clone(&self.client),
                "run-1",
                PollPolicy::default(),
                timeout,
                Arc::clone(&self.reconciler),
                Arc::clone(&self.tracker),
                self.teardown.clone(),
            )
        }
    }

    #[test]
    fn test_default_policy_constants() {
        let policy = PollPolicy::default();
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_millis(1500));
        assert_eq!(policy.multiplier, 1.5);
        assert_eq!(policy.max_materialize_retries, 5);
        assert_eq!(policy.budget(Duration::from_secs(1)), Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_running_polls() {
        let fixture = Fixture::new(vec![
            running(),
            running(),
            succeeded(SolveResult::new(5, 5)),
        ]);
        let start = Instant::now();

        let result = fixture.poll_loop(Duration::from_secs(30)).run().await.unwrap();

        assert_eq!(result, SolveResult::new(5, 5));
        assert_eq!(fixture.client.poll_count(), 3);
        // Two backoff sleeps: 250ms + 375ms.
        assert_eq!(start.elapsed(), Duration::from_millis(625));
        assert_eq!(fixture.reconciler.result(), Some(SolveResult::new(5, 5)));
        assert_eq!(fixture.tracker.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_retried() {
        let fixture = Fixture::new(vec![
            network_error(),
            network_error(),
            succeeded(SolveResult::new(2, 3)),
        ]);

        let result = fixture.poll_loop(Duration::from_secs(30)).run().await.unwrap();
        assert_eq!(result.scheduled, 2);
        assert_eq!(fixture.client.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmaterialized_fails_on_sixth_observation() {
        let fixture = Fixture::new(vec![unmaterialized()]);
        let start = Instant::now();

        let err = fixture.poll_loop(Duration::from_secs(30)).run().await.unwrap_err();

        assert!(matches!(err, RunError::ResultUnavailable { observations: 6 }));
        assert_eq!(fixture.client.poll_count(), 6);
        // Five fixed 100ms sleeps, no exponential backoff.
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmaterialized_counter_resets_on_running() {
        let mut script = vec![unmaterialized(); 5];
        script.push(running());
        script.extend(vec![unmaterialized(); 5]);
        script.push(succeeded(SolveResult::new(1, 1)));
        let fixture = Fixture::new(script);

        let result = fixture.poll_loop(Duration::from_secs(30)).run().await.unwrap();
        assert_eq!(result.scheduled, 1);
        assert_eq!(fixture.client.poll_count(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_carries_backend_message() {
        let fixture = Fixture::new(vec![Ok(
            RunStatus::new("run-1", RunState::Failed).with_error("infeasible")
        )]);

        let err = fixture.poll_loop(Duration::from_secs(30)).run().await.unwrap_err();
        match err {
            RunError::RunFailed { message } => assert_eq!(message, "infeasible"),
            other => panic!("expected RunFailed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_without_message_uses_generic_text() {
        let fixture = Fixture::new(vec![Ok(RunStatus::new("run-1", RunState::Failed))]);

        let err = fixture.poll_loop(Duration::from_secs(30)).run().await.unwrap_err();
        match err {
            RunError::RunFailed { message } => assert_eq!(message, RunError::GENERIC_FAILURE),
            other => panic!("expected RunFailed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_cancelled() {
        let fixture = Fixture::new(vec![Ok(RunStatus::new("run-1", RunState::Cancelled))]);

        let err = fixture.poll_loop(Duration::from_secs(30)).run().await.unwrap_err();
        assert!(matches!(err, RunError::RunCancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_within_one_backoff_of_deadline() {
        let fixture = Fixture::new(vec![running()]);
        let start = Instant::now();

        let err = fixture.poll_loop(Duration::from_secs(1)).run().await.unwrap_err();

        let elapsed = start.elapsed();
        assert!(matches!(err, RunError::RunTimedOut { .. }));
        assert!(elapsed >= Duration::from_secs(61));
        assert!(elapsed <= Duration::from_secs(61) + DEFAULT_MAX_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_is_cut_off_at_deadline() {
        let fixture = Fixture {
            client: Arc::new(
                ScriptedClient::new(vec![running()]).with_poll_latency(Duration::from_secs(30)),
            ),
            reconciler: Arc::new(ResultReconciler::new()),
            tracker: Arc::new(AlternativeTracker::new()),
            teardown: CancellationToken::new(),
        };
        let start = Instant::now();

        let err = fixture.poll_loop(Duration::from_secs(1)).run().await.unwrap_err();

        let elapsed = start.elapsed();
        assert!(matches!(err, RunError::RunTimedOut { .. }));
        assert!(elapsed >= Duration::from_secs(61));
        assert!(elapsed <= Duration::from_secs(61) + DEFAULT_MAX_DELAY);
        // Fetches finished at 30s and 60.25s; the third was abandoned.
        assert_eq!(fixture.client.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleep_is_clamped_to_deadline() {
        let fixture = Fixture::new(vec![running()]);
        let policy = PollPolicy {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(10),
            grace: Duration::from_secs(2),
            ..PollPolicy::default()
        };
        let poll = PollLoop::new(
            Arc::clone(&fixture.client),
            "run-1",
            policy,
            Duration::from_secs(1),
            Arc::clone(&fixture.reconciler),
            Arc::clone(&fixture.tracker),
            fixture.teardown.clone(),
        );
        let start = Instant::now();

        let err = poll.run().await.unwrap_err();

        assert!(matches!(err, RunError::RunTimedOut { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(fixture.client.poll_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_last_transport_error() {
        let fixture = Fixture::new(vec![network_error()]);

        let err = fixture.poll_loop(Duration::from_secs(1)).run().await.unwrap_err();
        match err {
            RunError::RunTimedOut {
                last_transport_error,
                ..
            } => assert!(last_transport_error.unwrap().contains("connection reset")),
            other => panic!("expected RunTimedOut, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_result_reconciled_elsewhere() {
        let fixture = Fixture::new(vec![running()]);
        let poll = fixture.poll_loop(Duration::from_secs(30)).start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        fixture
            .reconciler
            .try_set(SolveResult::new(5, 5).with_status("optimal"));

        let result = poll.await.unwrap().unwrap();
        assert!(result.is_optimal());
        // Woken from the 250ms sleep without polling again.
        assert_eq!(fixture.client.poll_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_poll_success_keeps_reconciled_value() {
        let fixture = Fixture::new(vec![succeeded(SolveResult::new(1, 5))]);
        fixture.reconciler.try_set(SolveResult::new(5, 5));

        // Reconciled before the first step, so nothing is polled.
        let result = fixture.poll_loop(Duration::from_secs(30)).run().await.unwrap();
        assert_eq!(result.scheduled, 5);
        assert_eq!(fixture.client.poll_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_reconciler_stops_loop() {
        let fixture = Fixture::new(vec![running()]);
        let poll = fixture.poll_loop(Duration::from_secs(30)).start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        fixture.reconciler.try_cancel();

        let err = poll.await.unwrap().unwrap_err();
        assert!(matches!(err, RunError::RunCancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_interrupts_inflight_fetch() {
        let fixture = Fixture {
            client: Arc::new(
                ScriptedClient::new(vec![running()]).with_poll_latency(Duration::from_secs(10)),
            ),
            reconciler: Arc::new(ResultReconciler::new()),
            tracker: Arc::new(AlternativeTracker::new()),
            teardown: CancellationToken::new(),
        };
        let poll = fixture.poll_loop(Duration::from_secs(30)).start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        fixture.teardown.cancel();

        let err = poll.await.unwrap().unwrap_err();
        assert!(matches!(err, RunError::RunCancelled));
        assert_eq!(fixture.client.poll_count(), 0);
    }
}
