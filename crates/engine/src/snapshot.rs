//! New-pool detection against the last filtered snapshot.

use crate::filter::ThresholdFilter;
use dashmap::DashMap;
use poolwatch_core::{Pool, UserSettings};
use tracing::debug;

/// Outcome of one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Filtered pools that were not in the previous snapshot.
    pub new_pools: Vec<Pool>,
    /// The full filtered set, which replaces the previous snapshot.
    pub snapshot: Vec<Pool>,
}

/// Filter `pools` for `settings` and diff against `previous`.
///
/// Returns `None` for an empty listing: nothing is filtered and the caller
/// must leave its snapshot untouched. Pools are compared field by field.
pub fn evaluate(
    pools: &[Pool],
    settings: Option<&UserSettings>,
    previous: &[Pool],
) -> Option<Evaluation> {
    if pools.is_empty() {
        return None;
    }

    let snapshot = ThresholdFilter::for_settings(settings).apply(pools);
    let new_pools = snapshot
        .iter()
        .filter(|pool| !previous.contains(pool))
        .cloned()
        .collect();

    Some(Evaluation {
        new_pools,
        snapshot,
    })
}

/// Last filtered snapshot per user, kept in memory until restart.
#[derive(Debug, Default)]
pub struct SnapshotTracker {
    snapshots: DashMap<i64, Vec<Pool>>,
}

impl SnapshotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a listing for one user, store the new snapshot, and return
    /// the pools that user has not seen before.
    pub fn check(
        &self,
        user_id: i64,
        pools: &[Pool],
        settings: Option<&UserSettings>,
    ) -> Vec<Pool> {
        if pools.is_empty() {
            debug!(user_id = user_id, "Empty listing, snapshot kept");
            return Vec::new();
        }

        let mut entry = self.snapshots.entry(user_id).or_default();
        let Some(evaluation) = evaluate(pools, settings, entry.value()) else {
            return Vec::new();
        };

        debug!(
            user_id = user_id,
            matched = evaluation.snapshot.len(),
            new = evaluation.new_pools.len(),
            "Evaluated pool listing"
        );

        *entry.value_mut() = evaluation.snapshot;
        evaluation.new_pools
    }

    /// Copy of a user's current snapshot.
    pub fn snapshot(&self, user_id: i64) -> Option<Vec<Pool>> {
        self.snapshots.get(&user_id).map(|s| s.value().clone())
    }

    /// Number of users with a snapshot.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&self) {
        self.snapshots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pool(name: &str, tvl: f64, fees: f64) -> Pool {
        Pool {
            pair_name: Some(name.into()),
            tvl: Some(tvl),
            fees: Some(fees),
            ..Default::default()
        }
    }

    fn settings() -> UserSettings {
        UserSettings {
            user_id: 1,
            min_tvl: 10.0,
            max_tvl: 1000.0,
            min_fees: 0.0,
            max_fees: 5.0,
        }
    }

    #[test]
    fn test_filtered_pools_are_new_against_empty_snapshot() {
        let pools = vec![pool("A", 500.0, 1.0), pool("B", 2.0, 1.0)];

        let evaluation = evaluate(&pools, Some(&settings()), &[]).unwrap();
        assert_eq!(evaluation.snapshot, vec![pool("A", 500.0, 1.0)]);
        assert_eq!(evaluation.new_pools, evaluation.snapshot);
    }

    #[test]
    fn test_unchanged_snapshot_yields_nothing_new() {
        let pools = vec![pool("A", 500.0, 1.0), pool("B", 2.0, 1.0)];
        let previous = vec![pool("A", 500.0, 1.0)];

        let evaluation = evaluate(&pools, Some(&settings()), &previous).unwrap();
        assert!(evaluation.new_pools.is_empty());
        assert_eq!(evaluation.snapshot, previous);
    }

    #[test]
    fn test_second_evaluation_is_idempotent() {
        let pools = vec![pool("A", 500.0, 1.0), pool("C", 40.0, 0.2)];

        let first = evaluate(&pools, Some(&settings()), &[]).unwrap();
        assert_eq!(first.new_pools.len(), 2);

        let second = evaluate(&pools, Some(&settings()), &first.snapshot).unwrap();
        assert!(second.new_pools.is_empty());
        assert_eq!(second.snapshot, first.snapshot);
    }

    #[test]
    fn test_changed_field_counts_as_new() {
        let previous = vec![pool("A", 500.0, 1.0)];
        let pools = vec![pool("A", 501.0, 1.0)];

        let evaluation = evaluate(&pools, Some(&settings()), &previous).unwrap();
        assert_eq!(evaluation.new_pools, pools);
    }

    #[test]
    fn test_empty_listing_returns_none() {
        assert!(evaluate(&[], Some(&settings()), &[pool("A", 500.0, 1.0)]).is_none());
    }

    #[test]
    fn test_unconfigured_user_sees_large_pool() {
        let pools = vec![pool("WHALE", 999_999_999.0, 1.0)];
        let evaluation = evaluate(&pools, None, &[]).unwrap();
        assert_eq!(evaluation.new_pools, pools);
    }

    #[test]
    fn test_tracker_replaces_snapshot_even_without_new_pools() {
        let tracker = SnapshotTracker::new();
        let s = settings();

        let first = tracker.check(1, &[pool("A", 500.0, 1.0), pool("B", 20.0, 1.0)], Some(&s));
        assert_eq!(first.len(), 2);

        // B dropped out; A unchanged. Nothing new, but the snapshot shrinks.
        let second = tracker.check(1, &[pool("A", 500.0, 1.0)], Some(&s));
        assert!(second.is_empty());
        assert_eq!(tracker.snapshot(1), Some(vec![pool("A", 500.0, 1.0)]));

        // B reappearing is new again.
        let third = tracker.check(1, &[pool("A", 500.0, 1.0), pool("B", 20.0, 1.0)], Some(&s));
        assert_eq!(third, vec![pool("B", 20.0, 1.0)]);
    }

    #[test]
    fn test_tracker_keeps_snapshot_on_empty_listing() {
        let tracker = SnapshotTracker::new();
        tracker.check(1, &[pool("A", 500.0, 1.0)], Some(&settings()));

        assert!(tracker.check(1, &[], Some(&settings())).is_empty());
        assert_eq!(tracker.snapshot(1), Some(vec![pool("A", 500.0, 1.0)]));
    }

    #[test]
    fn test_tracker_isolates_users() {
        let tracker = SnapshotTracker::new();
        let listing = vec![pool("A", 500.0, 1.0)];

        assert_eq!(tracker.check(1, &listing, None).len(), 1);
        assert_eq!(tracker.check(2, &listing, None).len(), 1);
        assert!(tracker.check(1, &listing, None).is_empty());
        assert_eq!(tracker.len(), 2);

        tracker.clear();
        assert!(tracker.is_empty());
    }
}
