//! Single-assignment slot for a run's authoritative outcome.
//!
//! Both the push subscriber (on a `final` event) and the poll loop (on a
//! materialized `succeeded` status) race to fill the slot; the first write
//! wins and every later write is dropped. Cancellation competes for the same
//! slot, so once a run is cancelled no result can be accepted, and once a
//! result is accepted a late cancel cannot replace it.
//!
//! The slot is a `tokio::sync::watch` channel mutated with
//! `send_if_modified`, which checks and sets under the channel's lock.

use tokio::sync::watch;

use super::types::SolveResult;

/// Value held by a settled [`ResultReconciler`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded(SolveResult),
    Cancelled,
}

/// Write-once outcome cell shared by the push and poll channels.
#[derive(Debug)]
pub struct ResultReconciler {
    slot: watch::Sender<Option<Outcome>>,
}

impl ResultReconciler {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    /// Stores `result` if nothing has been stored yet.
    ///
    /// Returns true if this call won.
    pub fn try_set(&self, result: SolveResult) -> bool {
        self.try_settle(Outcome::Succeeded(result))
    }

    /// Marks the run cancelled if nothing has been stored yet.
    ///
    /// Returns true if this call won.
    pub fn try_cancel(&self) -> bool {
        self.try_settle(Outcome::Cancelled)
    }

    fn try_settle(&self, outcome: Outcome) -> bool {
        self.slot.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }

    /// Returns the stored outcome, if any.
    pub fn get(&self) -> Option<Outcome> {
        self.slot.borrow().clone()
    }

    /// Returns the stored result if the run settled successfully.
    pub fn result(&self) -> Option<SolveResult> {
        match &*self.slot.borrow() {
            Some(Outcome::Succeeded(result)) => Some(result.clone()),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(&*self.slot.borrow(), Some(Outcome::Cancelled))
    }

    /// Waits until the slot is filled and returns its value.
    pub async fn settled(&self) -> Outcome {
        let mut rx = self.slot.subscribe();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                // Unreachable while `self` owns the sender.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for ResultReconciler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_first_write_wins() {
        let reconciler = ResultReconciler::new();
        assert!(reconciler.get().is_none());

        assert!(reconciler.try_set(SolveResult::new(5, 5).with_status("optimal")));
        assert!(!reconciler.try_set(SolveResult::new(1, 5)));

        let result = reconciler.result().unwrap();
        assert_eq!(result.scheduled, 5);
        assert!(result.is_optimal());
    }

    #[test]
    fn test_cancel_after_result_is_noop() {
        let reconciler = ResultReconciler::new();
        assert!(reconciler.try_set(SolveResult::new(2, 3)));
        assert!(!reconciler.try_cancel());
        assert!(!reconciler.is_cancelled());
        assert!(reconciler.result().is_some());
    }

    #[test]
    fn test_result_after_cancel_is_rejected() {
        let reconciler = ResultReconciler::new();
        assert!(reconciler.try_cancel());
        assert!(!reconciler.try_set(SolveResult::new(5, 5)));
        assert_eq!(reconciler.get(), Some(Outcome::Cancelled));
        assert!(reconciler.result().is_none());
    }

    #[test]
    fn test_concurrent_writers_exactly_one_wins() {
        let reconciler = Arc::new(ResultReconciler::new());
        let wins = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..16)
            .map(|i| {
                let reconciler = Arc::clone(&reconciler);
                let wins = Arc::clone(&wins);
                std::thread::spawn(move || {
                    if reconciler.try_set(SolveResult::new(i, 16)) {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert!(reconciler.is_settled());
    }

    #[tokio::test]
    async fn test_settled_wakes_on_later_write() {
        let reconciler = Arc::new(ResultReconciler::new());
        let writer = Arc::clone(&reconciler);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.try_set(SolveResult::new(4, 4));
        });

        let outcome = tokio::time::timeout(Duration::from_secs(2), reconciler.settled())
            .await
            .expect("reconciler never settled");
        assert_eq!(outcome, Outcome::Succeeded(SolveResult::new(4, 4)));
    }

    #[tokio::test]
    async fn test_settled_returns_immediately_when_already_set() {
        let reconciler = ResultReconciler::new();
        reconciler.try_cancel();
        assert_eq!(reconciler.settled().await, Outcome::Cancelled);
    }
}
