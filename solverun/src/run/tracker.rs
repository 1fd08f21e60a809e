//! Append-only log of every solution observed during a run.
//!
//! Entries keep observation order. Ranking is a pure fold over that order so
//! `best` is reproducible for a given sequence of `record` calls.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::types::{Alternative, AlternativeSource, SolveResult};

/// Which tie-breakers `best` applies after the scheduled count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankCriteria {
    /// Compare secondary objective scores (missing counts as -1).
    pub secondary_score: bool,
    /// Prefer results tagged `optimal`.
    pub prefer_optimal: bool,
}

impl RankCriteria {
    /// Rank by scheduled count alone; ties go to the earliest entry.
    pub fn scheduled_only() -> Self {
        Self {
            secondary_score: false,
            prefer_optimal: false,
        }
    }

    /// Orders `a` against `b`; `Greater` means `a` ranks higher.
    pub fn compare(&self, a: &SolveResult, b: &SolveResult) -> Ordering {
        let mut ordering = a.scheduled.cmp(&b.scheduled);
        if self.secondary_score {
            ordering = ordering.then_with(|| a.secondary_score().total_cmp(&b.secondary_score()));
        }
        if self.prefer_optimal {
            ordering = ordering.then_with(|| a.is_optimal().cmp(&b.is_optimal()));
        }
        ordering
    }
}

impl Default for RankCriteria {
    fn default() -> Self {
        Self {
            secondary_score: true,
            prefer_optimal: true,
        }
    }
}

/// Picks the best entry of `alternatives` under `criteria`.
///
/// A later entry replaces the current pick only when it ranks strictly
/// higher, so full ties resolve to the earliest entry.
pub fn rank_best<'a>(
    alternatives: &'a [Alternative],
    criteria: &RankCriteria,
) -> Option<&'a Alternative> {
    alternatives.iter().fold(None, |best, candidate| match best {
        Some(current)
            if criteria.compare(&candidate.result, &current.result) != Ordering::Greater =>
        {
            Some(current)
        }
        _ => Some(candidate),
    })
}

/// Thread-safe alternative log shared by the push and poll channels.
#[derive(Debug, Default)]
pub struct AlternativeTracker {
    entries: Mutex<Vec<Alternative>>,
}

impl AlternativeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `alternative` unconditionally.
    pub fn record(&self, alternative: Alternative) {
        self.entries.lock().push(alternative);
    }

    /// Wraps `result` as an alternative and appends it.
    ///
    /// The id is the result's own `id` when present, otherwise `alt-<n>`
    /// where `n` is the 1-based arrival position.
    pub fn record_result(
        &self,
        result: SolveResult,
        received_at: DateTime<Utc>,
        source: AlternativeSource,
    ) -> Alternative {
        let mut entries = self.entries.lock();
        let id = result
            .id
            .clone()
            .unwrap_or_else(|| format!("alt-{}", entries.len() + 1));
        let alternative = Alternative {
            id,
            result,
            received_at,
            source,
        };
        entries.push(alternative.clone());
        alternative
    }

    /// Returns the highest-ranked alternative, if any were recorded.
    pub fn best(&self, criteria: &RankCriteria) -> Option<Alternative> {
        let entries = self.entries.lock();
        rank_best(&entries, criteria).cloned()
    }

    /// Returns a copy of every entry in observation order.
    pub fn snapshot(&self) -> Vec<Alternative> {
        self.entries.lock().clone()
    }

    /// Returns the first occurrence of each id, in observation order.
    pub fn distinct_by_id(&self) -> Vec<Alternative> {
        let entries = self.entries.lock();
        let mut seen = HashSet::new();
        entries
            .iter()
            .filter(|alt| seen.insert(alt.id.as_str()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tracker: &AlternativeTracker, result: SolveResult) -> Alternative {
        tracker.record_result(result, Utc::now(), AlternativeSource::Push)
    }

    #[test]
    fn test_empty_tracker_has_no_best() {
        let tracker = AlternativeTracker::new();
        assert!(tracker.is_empty());
        assert!(tracker.best(&RankCriteria::default()).is_none());
    }

    #[test]
    fn test_synthesized_ids_follow_arrival_order() {
        let tracker = AlternativeTracker::new();
        let first = record(&tracker, SolveResult::new(1, 5));
        let second = record(&tracker, SolveResult::new(2, 5).with_id("from-server"));
        let third = record(&tracker, SolveResult::new(3, 5));

        assert_eq!(first.id, "alt-1");
        assert_eq!(second.id, "from-server");
        assert_eq!(third.id, "alt-3");
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_higher_scheduled_wins() {
        let tracker = AlternativeTracker::new();
        record(&tracker, SolveResult::new(3, 5).with_status("optimal"));
        record(&tracker, SolveResult::new(4, 5));
        record(&tracker, SolveResult::new(2, 5).with_secondary(10.0, 10.0));

        let best = tracker.best(&RankCriteria::default()).unwrap();
        assert_eq!(best.result.scheduled, 4);
        assert_eq!(best.id, "alt-2");
    }

    #[test]
    fn test_secondary_score_breaks_scheduled_tie() {
        let tracker = AlternativeTracker::new();
        record(&tracker, SolveResult::new(5, 5).with_secondary(3.0, 10.0));
        record(&tracker, SolveResult::new(5, 5).with_secondary(7.0, 10.0));
        record(&tracker, SolveResult::new(5, 5).with_secondary(5.0, 10.0));

        let best = tracker.best(&RankCriteria::default()).unwrap();
        assert_eq!(best.id, "alt-2");
    }

    #[test]
    fn test_present_score_outranks_missing_score() {
        let tracker = AlternativeTracker::new();
        record(&tracker, SolveResult::new(5, 5).with_status("optimal"));
        record(&tracker, SolveResult::new(5, 5).with_secondary(0.0, 10.0));

        let best = tracker.best(&RankCriteria::default()).unwrap();
        assert_eq!(best.id, "alt-2");
    }

    #[test]
    fn test_optimal_breaks_score_tie() {
        let tracker = AlternativeTracker::new();
        record(&tracker, SolveResult::new(5, 5).with_secondary(4.0, 10.0));
        record(&tracker, SolveResult::new(5, 5).with_secondary(4.0, 10.0).with_status("OPTIMAL"));

        let best = tracker.best(&RankCriteria::default()).unwrap();
        assert_eq!(best.id, "alt-2");
    }

    #[test]
    fn test_full_tie_resolves_to_earliest() {
        let tracker = AlternativeTracker::new();
        for _ in 0..4 {
            record(&tracker, SolveResult::new(5, 5).with_status("optimal"));
        }

        for _ in 0..3 {
            let best = tracker.best(&RankCriteria::default()).unwrap();
            assert_eq!(best.id, "alt-1");
        }
    }

    #[test]
    fn test_scheduled_only_ignores_tie_breakers() {
        let tracker = AlternativeTracker::new();
        record(&tracker, SolveResult::new(5, 5));
        record(&tracker, SolveResult::new(5, 5).with_secondary(9.0, 10.0).with_status("optimal"));

        let best = tracker.best(&RankCriteria::scheduled_only()).unwrap();
        assert_eq!(best.id, "alt-1");
    }

    #[test]
    fn test_distinct_by_id_keeps_first_occurrence() {
        let tracker = AlternativeTracker::new();
        record(&tracker, SolveResult::new(1, 5).with_id("a"));
        record(&tracker, SolveResult::new(2, 5).with_id("b"));
        record(&tracker, SolveResult::new(3, 5).with_id("a"));

        let distinct = tracker.distinct_by_id();
        assert_eq!(distinct.len(), 2);
        assert_eq!(distinct[0].id, "a");
        assert_eq!(distinct[0].result.scheduled, 1);
        assert_eq!(distinct[1].id, "b");
        assert_eq!(tracker.snapshot().len(), 3);
    }

    #[test]
    fn test_rank_best_on_slice() {
        let alternatives = vec![
            Alternative {
                id: "x".into(),
                result: SolveResult::new(1, 2),
                received_at: Utc::now(),
                source: AlternativeSource::Poll,
            },
            Alternative {
                id: "y".into(),
                result: SolveResult::new(2, 2),
                received_at: Utc::now(),
                source: AlternativeSource::Push,
            },
        ];
        let best = rank_best(&alternatives, &RankCriteria::default()).unwrap();
        assert_eq!(best.id, "y");
    }
}
