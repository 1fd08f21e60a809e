//! Caller-facing run observers.
//!
//! Observers are notified from the push subscriber task in arrival order,
//! independently of how `wait` resolves. Every method has a no-op default.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::stream::ChannelStatus;
use super::types::SolveResult;

/// Receives progress notifications for a run.
pub trait RunObserver: Send + Sync {
    /// An intermediate solution arrived. Also called with the final result.
    fn on_snapshot(&self, _result: &SolveResult) {}

    /// The push channel delivered the final result.
    fn on_final(&self, _result: &SolveResult) {}

    fn on_heartbeat(&self, _payload: &Value) {}

    fn on_meta(&self, _payload: &Value) {}

    /// The solver reported a non-fatal error on the push channel.
    fn on_solver_error(&self, _payload: &Value) {}

    fn on_channel_status(&self, _status: ChannelStatus) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Adapts a closure to [`RunObserver::on_snapshot`].
pub(crate) struct SnapshotFn<F>(pub F);

impl<F> RunObserver for SnapshotFn<F>
where
    F: Fn(&SolveResult) + Send + Sync,
{
    fn on_snapshot(&self, result: &SolveResult) {
        (self.0)(result)
    }
}

/// Adapts a closure to [`RunObserver::on_final`].
pub(crate) struct FinalFn<F>(pub F);

impl<F> RunObserver for FinalFn<F>
where
    F: Fn(&SolveResult) + Send + Sync,
{
    fn on_final(&self, result: &SolveResult) {
        (self.0)(result)
    }
}

/// Registered observers of one run.
///
/// Notification iterates over a copy of the list so observers may register
/// further observers without deadlocking.
#[derive(Default)]
pub struct ObserverSet {
    observers: RwLock<Vec<Arc<dyn RunObserver>>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, observer: Arc<dyn RunObserver>) {
        self.observers.write().push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    fn each(&self, f: impl Fn(&dyn RunObserver)) {
        let observers = self.observers.read().clone();
        for observer in &observers {
            f(observer.as_ref());
        }
    }

    pub fn snapshot(&self, result: &SolveResult) {
        self.each(|o| o.on_snapshot(result));
    }

    pub fn final_result(&self, result: &SolveResult) {
        self.each(|o| o.on_final(result));
    }

    pub fn heartbeat(&self, payload: &Value) {
        self.each(|o| o.on_heartbeat(payload));
    }

    pub fn meta(&self, payload: &Value) {
        self.each(|o| o.on_meta(payload));
    }

    pub fn solver_error(&self, payload: &Value) {
        self.each(|o| o.on_solver_error(payload));
    }

    pub fn channel_status(&self, status: ChannelStatus) {
        self.each(|o| o.on_channel_status(status));
    }
}
