//! Commit watermark over out-of-order completions
//!
//! Messages of one partition may finish in any order once the dispatcher
//! has reordered them. The tracker keeps, per partition, the offsets still
//! in flight and only ever proposes a commit that leaves every unfinished
//! offset uncommitted:
//!
//! `last_committed <= min(unprocessed) <= highest_seen + 1`

use crate::core::sync::handle_mutex_poison;
use crate::queue::api::SortedVec;
use crate::stream::broker::TopicPartition;
use crate::stream::error::OffsetError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Offset value before anything was seen or committed
pub const NO_OFFSET: i64 = -1;

/// Per-partition bookkeeping
struct PartitionOffsetState {
    unprocessed: SortedVec<i64>,
    last_committed: i64,
    highest_seen: i64,
}

impl PartitionOffsetState {
    fn new() -> Self {
        Self {
            unprocessed: SortedVec::from_fn(|a: &i64, b: &i64| a.cmp(b)),
            last_committed: NO_OFFSET,
            highest_seen: NO_OFFSET,
        }
    }

    /// Lowest offset not yet safe to skip
    fn candidate(&self) -> i64 {
        self.unprocessed
            .first()
            .copied()
            .unwrap_or(self.highest_seen + 1)
    }
}

/// Copy of one partition's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetSnapshot {
    pub unprocessed: Vec<i64>,
    pub last_committed: i64,
    pub highest_seen: i64,
}

/// What to do after a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDecision {
    /// Commit `offset`; `previous` was the last committed value
    Commit { offset: i64, previous: i64 },
    /// The watermark did not move past the last commit
    NothingToCommit { candidate: i64, last_committed: i64 },
}

#[derive(Default)]
pub struct PartitionOffsetTracker {
    partitions: Mutex<HashMap<TopicPartition, PartitionOffsetState>>,
}

impl std::fmt::Debug for PartitionOffsetTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionOffsetTracker")
            .field("partitions", &self.partitions())
            .finish()
    }
}

impl PartitionOffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<TopicPartition, PartitionOffsetState>>, OffsetError> {
        handle_mutex_poison(self.partitions.lock(), |message| OffsetError::Poisoned {
            message,
        })
    }

    /// Register the position a consumer starts reading `partition` from
    ///
    /// The group already committed that position, so completions that do
    /// not move past it produce no commit. Ignored once the partition is
    /// known.
    pub fn start_partition(&self, partition: &TopicPartition, position: i64) -> Result<(), OffsetError> {
        let mut partitions = self.lock()?;
        partitions.entry(partition.clone()).or_insert_with(|| {
            let mut state = PartitionOffsetState::new();
            state.last_committed = position;
            state.highest_seen = position - 1;
            state
        });
        Ok(())
    }

    /// Mark `offset` as in flight
    pub fn record_received(&self, partition: &TopicPartition, offset: i64) -> Result<(), OffsetError> {
        let mut partitions = self.lock()?;
        let state = partitions
            .entry(partition.clone())
            .or_insert_with(PartitionOffsetState::new);
        state.unprocessed.insert(offset);
        state.highest_seen = state.highest_seen.max(offset);
        Ok(())
    }

    /// Mark `offset` as finished and decide whether the watermark moved
    ///
    /// A `Commit` decision is final: `last_committed` is raised before the
    /// caller talks to the broker.
    pub fn complete(&self, partition: &TopicPartition, offset: i64) -> Result<CommitDecision, OffsetError> {
        let mut partitions = self.lock()?;
        let state = partitions
            .get_mut(partition)
            .ok_or_else(|| OffsetError::UnknownPartition {
                topic: partition.topic.clone(),
                partition: partition.partition,
            })?;

        if state.unprocessed.remove(&offset).is_none() {
            return Err(OffsetError::UnknownOffset {
                topic: partition.topic.clone(),
                partition: partition.partition,
                offset,
            });
        }

        let candidate = state.candidate();
        if state.last_committed < candidate {
            let previous = state.last_committed;
            state.last_committed = candidate;
            Ok(CommitDecision::Commit {
                offset: candidate,
                previous,
            })
        } else {
            Ok(CommitDecision::NothingToCommit {
                candidate,
                last_committed: state.last_committed,
            })
        }
    }

    pub fn state(&self, partition: &TopicPartition) -> Option<OffsetSnapshot> {
        let partitions = self.lock().ok()?;
        partitions.get(partition).map(|state| OffsetSnapshot {
            unprocessed: state.unprocessed.as_slice().to_vec(),
            last_committed: state.last_committed,
            highest_seen: state.highest_seen,
        })
    }

    /// Offsets of `partition` still in flight
    pub fn remaining(&self, partition: &TopicPartition) -> usize {
        self.lock()
            .ok()
            .and_then(|partitions| partitions.get(partition).map(|state| state.unprocessed.len()))
            .unwrap_or(0)
    }

    /// Partitions seen so far, sorted
    pub fn partitions(&self) -> Vec<TopicPartition> {
        let mut keys: Vec<TopicPartition> = self
            .lock()
            .map(|partitions| partitions.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events() -> TopicPartition {
        TopicPartition::new("edge_events", 0)
    }

    #[test]
    fn test_out_of_order_completion_never_skips_unfinished_offsets() {
        let tracker = PartitionOffsetTracker::new();
        let partition = events();
        tracker.start_partition(&partition, 1).unwrap();
        for offset in [1, 2, 3] {
            tracker.record_received(&partition, offset).unwrap();
        }

        assert_eq!(
            tracker.complete(&partition, 3),
            Ok(CommitDecision::NothingToCommit {
                candidate: 1,
                last_committed: 1
            })
        );
        assert_eq!(
            tracker.complete(&partition, 1),
            Ok(CommitDecision::Commit {
                offset: 2,
                previous: 1
            })
        );
        assert_eq!(
            tracker.complete(&partition, 2),
            Ok(CommitDecision::Commit {
                offset: 4,
                previous: 2
            })
        );

        let state = tracker.state(&partition).unwrap();
        assert_eq!(state.last_committed, 4);
        assert_eq!(state.highest_seen, 3);
        assert!(state.unprocessed.is_empty());
    }

    #[test]
    fn test_watermark_that_did_not_move_is_not_committed() {
        let tracker = PartitionOffsetTracker::new();
        let partition = events();
        for offset in [5, 6, 7] {
            tracker.record_received(&partition, offset).unwrap();
        }

        tracker.complete(&partition, 5).unwrap();
        let decision = tracker.complete(&partition, 7).unwrap();

        assert_eq!(
            decision,
            CommitDecision::NothingToCommit {
                candidate: 6,
                last_committed: 6
            }
        );
        assert_eq!(tracker.remaining(&partition), 1);
    }

    #[test]
    fn test_start_position_is_only_taken_once() {
        let tracker = PartitionOffsetTracker::new();
        let partition = events();
        tracker.start_partition(&partition, 4).unwrap();
        tracker.record_received(&partition, 4).unwrap();
        tracker.start_partition(&partition, 9).unwrap();

        let state = tracker.state(&partition).unwrap();
        assert_eq!(state.last_committed, 4);
        assert_eq!(state.unprocessed, vec![4]);
        assert_eq!(
            tracker.complete(&partition, 4),
            Ok(CommitDecision::Commit {
                offset: 5,
                previous: 4
            })
        );
    }

    #[test]
    fn test_completing_unknown_offsets_is_an_error() {
        let tracker = PartitionOffsetTracker::new();
        let partition = events();

        assert_eq!(
            tracker.complete(&partition, 0),
            Err(OffsetError::UnknownPartition {
                topic: "edge_events".into(),
                partition: 0
            })
        );

        tracker.record_received(&partition, 0).unwrap();
        tracker.complete(&partition, 0).unwrap();
        assert_eq!(
            tracker.complete(&partition, 0),
            Err(OffsetError::UnknownOffset {
                topic: "edge_events".into(),
                partition: 0,
                offset: 0
            })
        );
    }

    #[test]
    fn test_partitions_are_tracked_independently() {
        let tracker = PartitionOffsetTracker::new();
        let first = TopicPartition::new("edge_events", 0);
        let second = TopicPartition::new("edge_events", 1);
        tracker.record_received(&second, 10).unwrap();
        tracker.record_received(&first, 0).unwrap();

        assert_eq!(tracker.partitions(), vec![first.clone(), second.clone()]);
        assert_eq!(
            tracker.complete(&first, 0).unwrap(),
            CommitDecision::Commit {
                offset: 1,
                previous: NO_OFFSET
            }
        );
        assert_eq!(tracker.state(&second).unwrap().unprocessed, vec![10]);
    }
}
