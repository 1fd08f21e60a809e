//! Bounded exponential backoff.

use std::time::Duration;

/// Multiplicative backoff capped at a maximum delay.
///
/// [`Backoff::next_delay`] returns the delay to wait now and grows the next
/// one: with the default poll policy the sequence is 250ms, 375ms, 562.5ms,
/// 843.75ms, 1265.625ms and then 1500ms forever.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    initial: Duration,
    current: Duration,
    multiplier: f64,
    max: Duration,
}

impl Backoff {
    /// Creates a backoff. Multipliers below 1.0 are treated as 1.0.
    pub fn new(initial: Duration, multiplier: f64, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            current: initial,
            multiplier: if multiplier.is_finite() {
                multiplier.max(1.0)
            } else {
                1.0
            },
            max,
        }
    }

    /// The delay the next call to [`next_delay`](Self::next_delay) returns.
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Returns the current delay and advances to the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.multiplier).min(self.max);
        delay
    }

    /// Restarts the sequence from the initial delay.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
