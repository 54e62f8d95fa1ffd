//! Delayed State Transitions
//!
//! The emulator models eventual consistency with a time-ordered queue of
//! transitions: CreateStream commits a stream in CREATING and enqueues the
//! flip to ACTIVE; DeleteStream enqueues the actual removal; splits, merges,
//! and the other propagating mutations enqueue UPDATING → ACTIVE.
//!
//! One loop (driven by the coordinator) sleeps on the injected clock until
//! the earliest due entry, then applies everything due under the owning
//! region's write lock. Transitions are **idempotent**: firing one whose
//! precondition no longer holds (the stream was deleted, the status already
//! advanced) is a no-op. That is also the cancellation story: deleting a
//! stream simply strands its pending entries, which fizzle when they fire.
//!
//! The retention sweep is the one self-rescheduling entry: each firing
//! purges aged-out records across the region and re-enqueues itself.

use crate::store::RegionState;
use kinesis_mock_core::{ConsumerStatus, StreamStatus};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::debug;

/// A state change scheduled for the future.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// CREATING → ACTIVE or UPDATING → ACTIVE.
    StreamToActive { stream_name: String },
    /// DELETING → removed.
    RemoveStream { stream_name: String },
    /// Consumer CREATING → ACTIVE.
    ConsumerToActive {
        stream_name: String,
        consumer_name: String,
    },
    /// Consumer DELETING → removed.
    RemoveConsumer {
        stream_name: String,
        consumer_name: String,
    },
    /// Purge records past retention in every stream, then reschedule.
    RetentionSweep { interval_ms: u64 },
}

/// A transition bound to its region and due time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayedTransition {
    pub region: String,
    pub due_at_ms: i64,
    pub transition: Transition,
}

#[derive(Debug, PartialEq, Eq)]
struct Entry {
    due_at_ms: i64,
    seq: u64,
    inner: DelayedTransition,
}

// Min-heap by (due time, insertion order).
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.due_at_ms, self.seq).cmp(&(other.due_at_ms, other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The shared queue. Pushing wakes the scheduling loop so a newly enqueued
/// earlier deadline shortens the current sleep.
#[derive(Debug, Default)]
pub struct TransitionQueue {
    heap: Mutex<BinaryHeap<Reverse<Entry>>>,
    seq: AtomicU64,
    notify: Notify,
}

impl TransitionQueue {
    pub fn push(&self, transition: DelayedTransition) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.heap
            .lock()
            .expect("queue lock poisoned")
            .push(Reverse(Entry {
                due_at_ms: transition.due_at_ms,
                seq,
                inner: transition,
            }));
        // notify_one stores a permit, so a push that lands before the loop
        // starts waiting still wakes it.
        self.notify.notify_one();
    }

    pub fn push_all(&self, transitions: impl IntoIterator<Item = DelayedTransition>) {
        for t in transitions {
            self.push(t);
        }
    }

    /// Earliest deadline, if any entry is pending.
    pub fn next_due_ms(&self) -> Option<i64> {
        self.heap
            .lock()
            .expect("queue lock poisoned")
            .peek()
            .map(|Reverse(e)| e.due_at_ms)
    }

    /// Remove and return every entry due at or before `now_ms`, in firing
    /// order.
    pub fn pop_due(&self, now_ms: i64) -> Vec<DelayedTransition> {
        let mut heap = self.heap.lock().expect("queue lock poisoned");
        let mut due = Vec::new();
        while matches!(heap.peek(), Some(Reverse(e)) if e.due_at_ms <= now_ms) {
            due.push(heap.pop().expect("peeked above").0.inner);
        }
        due
    }

    /// Copy of every pending entry in firing order, for snapshots. The
    /// order is part of the snapshot contract: restoring pushes entries in
    /// this order, so a snapshot of the restored queue is identical.
    pub fn pending(&self) -> Vec<DelayedTransition> {
        let heap = self.heap.lock().expect("queue lock poisoned");
        let mut entries: Vec<(i64, u64, DelayedTransition)> = heap
            .iter()
            .map(|Reverse(e)| (e.due_at_ms, e.seq, e.inner.clone()))
            .collect();
        entries.sort_by_key(|(due, seq, _)| (*due, *seq));
        entries.into_iter().map(|(_, _, inner)| inner).collect()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until woken by a push. Combined with [`Self::next_due_ms`] this
    /// is the scheduling loop's idle state.
    pub async fn pushed(&self) {
        self.notify.notified().await;
    }
}

/// Apply one fired transition to its region. Returns follow-up transitions
/// to enqueue (only the retention sweep produces any).
pub fn apply_transition(
    state: &mut RegionState,
    transition: &Transition,
    now_ms: i64,
) -> Vec<DelayedTransition> {
    match transition {
        Transition::StreamToActive { stream_name } => {
            if let Some(stream) = state.streams.get_mut(stream_name) {
                if matches!(stream.status, StreamStatus::Creating | StreamStatus::Updating) {
                    debug!(stream = %stream_name, from = stream.status.as_str(), "stream becomes ACTIVE");
                    stream.status = StreamStatus::Active;
                }
            }
            Vec::new()
        }
        Transition::RemoveStream { stream_name } => {
            let deleting = state
                .streams
                .get(stream_name)
                .map(|s| s.status == StreamStatus::Deleting)
                .unwrap_or(false);
            if deleting {
                debug!(stream = %stream_name, "stream removed");
                state.streams.remove(stream_name);
            }
            Vec::new()
        }
        Transition::ConsumerToActive {
            stream_name,
            consumer_name,
        } => {
            if let Some(consumer) = state
                .streams
                .get_mut(stream_name)
                .and_then(|s| s.consumers.get_mut(consumer_name))
            {
                if consumer.consumer_status == ConsumerStatus::Creating {
                    consumer.consumer_status = ConsumerStatus::Active;
                }
            }
            Vec::new()
        }
        Transition::RemoveConsumer {
            stream_name,
            consumer_name,
        } => {
            if let Some(stream) = state.streams.get_mut(stream_name) {
                let deleting = stream
                    .consumers
                    .get(consumer_name)
                    .map(|c| c.consumer_status == ConsumerStatus::Deleting)
                    .unwrap_or(false);
                if deleting {
                    stream.consumers.remove(consumer_name);
                }
            }
            Vec::new()
        }
        Transition::RetentionSweep { interval_ms } => {
            let mut purged = 0usize;
            for stream in state.streams.values_mut() {
                let cutoff = stream.retention_cutoff_ms(now_ms);
                for shard in &mut stream.shards {
                    purged += shard.purge_records_before(cutoff);
                }
            }
            if purged > 0 {
                debug!(region = %state.region, purged, "retention sweep purged records");
            }
            vec![DelayedTransition {
                region: state.region.clone(),
                due_at_ms: now_ms + *interval_ms as i64,
                transition: Transition::RetentionSweep {
                    interval_ms: *interval_ms,
                },
            }]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinesis_mock_core::{Stream, StreamMode};

    fn delayed(due_at_ms: i64, stream: &str) -> DelayedTransition {
        DelayedTransition {
            region: "us-east-1".to_string(),
            due_at_ms,
            transition: Transition::StreamToActive {
                stream_name: stream.to_string(),
            },
        }
    }

    fn state_with(name: &str, status: StreamStatus) -> RegionState {
        let mut state = RegionState::new("us-east-1", "000000000000");
        let mut stream =
            Stream::new(name, "us-east-1", "000000000000", 1, StreamMode::Provisioned, 0);
        stream.status = status;
        state.streams.insert(name.to_string(), stream);
        state
    }

    // ---------------------------------------------------------------
    // Queue ordering
    // ---------------------------------------------------------------

    #[test]
    fn test_pop_due_returns_only_ripe_entries_in_order() {
        let queue = TransitionQueue::default();
        queue.push(delayed(300, "c"));
        queue.push(delayed(100, "a"));
        queue.push(delayed(200, "b"));

        let due = queue.pop_due(250);
        let names: Vec<&str> = due
            .iter()
            .map(|d| match &d.transition {
                Transition::StreamToActive { stream_name } => stream_name.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_due_ms(), Some(300));
    }

    #[test]
    fn test_same_deadline_fires_in_insertion_order() {
        let queue = TransitionQueue::default();
        queue.push(delayed(100, "first"));
        queue.push(delayed(100, "second"));
        let due = queue.pop_due(100);
        assert!(matches!(
            &due[0].transition,
            Transition::StreamToActive { stream_name } if stream_name == "first"
        ));
    }

    #[test]
    fn test_pending_preserves_everything() {
        let queue = TransitionQueue::default();
        queue.push(delayed(100, "a"));
        queue.push(delayed(200, "b"));
        assert_eq!(queue.pending().len(), 2);
        assert_eq!(queue.len(), 2);
    }

    // ---------------------------------------------------------------
    // Idempotent application
    // ---------------------------------------------------------------

    #[test]
    fn test_stream_to_active_from_creating() {
        let mut state = state_with("s1", StreamStatus::Creating);
        apply_transition(
            &mut state,
            &Transition::StreamToActive {
                stream_name: "s1".to_string(),
            },
            0,
        );
        assert_eq!(state.streams["s1"].status, StreamStatus::Active);
    }

    #[test]
    fn test_stream_to_active_is_noop_when_deleting() {
        let mut state = state_with("s1", StreamStatus::Deleting);
        apply_transition(
            &mut state,
            &Transition::StreamToActive {
                stream_name: "s1".to_string(),
            },
            0,
        );
        assert_eq!(state.streams["s1"].status, StreamStatus::Deleting);
    }

    #[test]
    fn test_stale_transition_for_deleted_stream_is_noop() {
        let mut state = RegionState::new("us-east-1", "000000000000");
        apply_transition(
            &mut state,
            &Transition::StreamToActive {
                stream_name: "ghost".to_string(),
            },
            0,
        );
        assert!(state.streams.is_empty());
    }

    #[test]
    fn test_remove_stream_only_when_deleting() {
        let mut state = state_with("s1", StreamStatus::Active);
        apply_transition(
            &mut state,
            &Transition::RemoveStream {
                stream_name: "s1".to_string(),
            },
            0,
        );
        assert!(state.streams.contains_key("s1"));

        state.streams.get_mut("s1").unwrap().status = StreamStatus::Deleting;
        apply_transition(
            &mut state,
            &Transition::RemoveStream {
                stream_name: "s1".to_string(),
            },
            0,
        );
        assert!(!state.streams.contains_key("s1"));
    }

    #[test]
    fn test_retention_sweep_purges_and_reschedules() {
        let mut state = state_with("s1", StreamStatus::Active);
        let now = 1_700_000_000_000i64;
        {
            let stream = state.streams.get_mut("s1").unwrap();
            let shard = stream.shards.first_mut().unwrap();
            shard
                .append(
                    bytes::Bytes::from("old"),
                    "k".to_string(),
                    kinesis_mock_core::EncryptionType::None,
                    now - 25 * 3_600_000,
                )
                .unwrap();
            shard
                .append(
                    bytes::Bytes::from("fresh"),
                    "k".to_string(),
                    kinesis_mock_core::EncryptionType::None,
                    now,
                )
                .unwrap();
        }
        let followups = apply_transition(
            &mut state,
            &Transition::RetentionSweep { interval_ms: 60_000 },
            now,
        );
        assert_eq!(state.streams["s1"].shards[0].records.len(), 1);
        assert_eq!(followups.len(), 1);
        assert_eq!(followups[0].due_at_ms, now + 60_000);
    }
}
