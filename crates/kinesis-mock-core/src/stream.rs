//! Streams: the top-level resource of the emulator.
//!
//! A stream owns an ordered list of shards (open shards always tile the full
//! hash-key space), registered consumers, tags, encryption settings, and an
//! audit history of its open-shard count. Status transitions follow the
//! service's eventual-consistency model:
//!
//! ```text
//! CreateStream          timer                    timer
//!      │                  │                        │
//!      ▼                  ▼                        ▼
//!  CREATING ─────────▶ ACTIVE ◀──────────────  UPDATING
//!                        │  │                      ▲
//!                        │  └── Split/Merge/Update ┘
//!              DeleteStream
//!                        │         timer
//!                        ▼           │
//!                    DELETING ───────┴──▶ (removed)
//! ```
//!
//! The timer edges are fired by the engine's scheduler; this module only
//! encodes which edges exist.

use crate::arn::StreamArn;
use crate::error::{KinesisError, Result};
use crate::shard::{even_hash_ranges, HashKeyRange, Shard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Minimum record retention (24 hours).
pub const MIN_RETENTION_HOURS: u32 = 24;
/// Maximum record retention (365 days).
pub const MAX_RETENTION_HOURS: u32 = 8760;
/// Maximum registered consumers per stream.
pub const MAX_CONSUMERS_PER_STREAM: usize = 20;
/// Maximum tags per stream.
pub const MAX_TAGS_PER_STREAM: usize = 50;
/// Shard-count audit entries kept per stream.
const SHARD_COUNT_HISTORY_CAP: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    Creating,
    Active,
    Updating,
    Deleting,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "CREATING",
            Self::Active => "ACTIVE",
            Self::Updating => "UPDATING",
            Self::Deleting => "DELETING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamMode {
    Provisioned,
    OnDemand,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioned => "PROVISIONED",
            Self::OnDemand => "ON_DEMAND",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncryptionType {
    None,
    Kms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumerStatus {
    Creating,
    Active,
    Deleting,
}

impl ConsumerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "CREATING",
            Self::Active => "ACTIVE",
            Self::Deleting => "DELETING",
        }
    }
}

/// The fixed set of shard-level metrics enhanced monitoring can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShardLevelMetric {
    IncomingBytes,
    IncomingRecords,
    OutgoingBytes,
    OutgoingRecords,
    WriteProvisionedThroughputExceeded,
    ReadProvisionedThroughputExceeded,
    IteratorAgeMilliseconds,
}

impl ShardLevelMetric {
    pub const ALL: [ShardLevelMetric; 7] = [
        Self::IncomingBytes,
        Self::IncomingRecords,
        Self::OutgoingBytes,
        Self::OutgoingRecords,
        Self::WriteProvisionedThroughputExceeded,
        Self::ReadProvisionedThroughputExceeded,
        Self::IteratorAgeMilliseconds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncomingBytes => "IncomingBytes",
            Self::IncomingRecords => "IncomingRecords",
            Self::OutgoingBytes => "OutgoingBytes",
            Self::OutgoingRecords => "OutgoingRecords",
            Self::WriteProvisionedThroughputExceeded => "WriteProvisionedThroughputExceeded",
            Self::ReadProvisionedThroughputExceeded => "ReadProvisionedThroughputExceeded",
            Self::IteratorAgeMilliseconds => "IteratorAgeMilliseconds",
        }
    }

    /// Resolve a wire name; `None` for anything outside the fixed set
    /// (including the pseudo-metric "ALL", which callers expand themselves).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.as_str() == name)
    }
}

/// A registered enhanced fan-out consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    pub consumer_name: String,
    pub consumer_arn: String,
    pub consumer_status: ConsumerStatus,
    pub consumer_creation_timestamp_ms: i64,
}

/// One entry of the open-shard-count audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardCountEvent {
    pub timestamp_ms: i64,
    pub open_shard_count: u32,
}

/// A stream and everything hanging off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub stream_name: String,
    pub region: String,
    pub account_id: String,
    pub stream_arn: String,
    pub created_at_ms: i64,
    pub status: StreamStatus,
    pub mode: StreamMode,
    pub retention_period_hours: u32,
    pub encryption_type: EncryptionType,
    pub key_id: Option<String>,
    pub enhanced_metrics: BTreeSet<ShardLevelMetric>,
    pub tags: BTreeMap<String, String>,
    pub consumers: BTreeMap<String, Consumer>,
    pub shards: Vec<Shard>,
    pub shard_count_history: Vec<ShardCountEvent>,

    // Next shard ordinal. Only ever grows; shard ids are never reused.
    next_shard_index: u32,
}

impl Stream {
    pub fn new(
        stream_name: &str,
        region: &str,
        account_id: &str,
        shard_count: u32,
        mode: StreamMode,
        now_ms: i64,
    ) -> Stream {
        let created_at_secs = (now_ms / 1000) as u32;
        let shards: Vec<Shard> = even_hash_ranges(shard_count)
            .into_iter()
            .enumerate()
            .map(|(i, range)| Shard::new(i as u32, range, created_at_secs))
            .collect();
        let mut stream = Stream {
            stream_name: stream_name.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            stream_arn: StreamArn::new(region, account_id, stream_name).to_arn_string(),
            created_at_ms: now_ms,
            status: StreamStatus::Creating,
            mode,
            retention_period_hours: MIN_RETENTION_HOURS,
            encryption_type: EncryptionType::None,
            key_id: None,
            enhanced_metrics: BTreeSet::new(),
            tags: BTreeMap::new(),
            consumers: BTreeMap::new(),
            shards,
            shard_count_history: Vec::new(),
            next_shard_index: shard_count,
        };
        stream.record_open_shard_count(now_ms);
        stream
    }

    /// Error unless the stream is ACTIVE (precondition of most mutations).
    pub fn require_active(&self) -> Result<()> {
        if self.status == StreamStatus::Active {
            Ok(())
        } else {
            Err(KinesisError::stream_not_active(
                &self.stream_name,
                self.status.as_str(),
            ))
        }
    }

    pub fn open_shards(&self) -> impl Iterator<Item = &Shard> {
        self.shards.iter().filter(|s| s.is_open())
    }

    pub fn open_shard_count(&self) -> u32 {
        self.open_shards().count() as u32
    }

    pub fn find_shard(&self, shard_id: &str) -> Option<&Shard> {
        self.shards.iter().find(|s| s.shard_id == shard_id)
    }

    pub fn find_shard_mut(&mut self, shard_id: &str) -> Option<&mut Shard> {
        self.shards.iter_mut().find(|s| s.shard_id == shard_id)
    }

    /// The unique open shard owning the hash key. Closed shards are never
    /// candidates.
    pub fn shard_for_hash_key(&self, hash_key: u128) -> Option<&Shard> {
        self.open_shards().find(|s| s.contains_hash_key(hash_key))
    }

    pub fn shard_for_hash_key_mut(&mut self, hash_key: u128) -> Option<&mut Shard> {
        self.shards
            .iter_mut()
            .find(|s| s.is_open() && s.contains_hash_key(hash_key))
    }

    /// Shards naming the given shard as a parent (either slot).
    pub fn child_shards_of(&self, shard_id: &str) -> Vec<&Shard> {
        self.shards
            .iter()
            .filter(|s| {
                s.parent_shard_id.as_deref() == Some(shard_id)
                    || s.adjacent_parent_shard_id.as_deref() == Some(shard_id)
            })
            .collect()
    }

    fn allocate_shard_index(&mut self) -> u32 {
        let index = self.next_shard_index;
        self.next_shard_index += 1;
        index
    }

    /// Append to the shard-count audit log, capped to the trailing entries.
    pub fn record_open_shard_count(&mut self, now_ms: i64) {
        let event = ShardCountEvent {
            timestamp_ms: now_ms,
            open_shard_count: self.open_shard_count(),
        };
        self.shard_count_history.push(event);
        if self.shard_count_history.len() > SHARD_COUNT_HISTORY_CAP {
            let excess = self.shard_count_history.len() - SHARD_COUNT_HISTORY_CAP;
            self.shard_count_history.drain(..excess);
        }
    }

    /// Arrival cutoff below which records have aged out of retention.
    pub fn retention_cutoff_ms(&self, now_ms: i64) -> i64 {
        now_ms - i64::from(self.retention_period_hours) * 3_600_000
    }

    /// Split one open shard at `new_starting_hash_key`, which must fall
    /// strictly inside the parent's range. The parent closes; two open
    /// children cover [start, key−1] and [key, end].
    pub fn split_shard(
        &mut self,
        shard_id: &str,
        new_starting_hash_key: u128,
        now_ms: i64,
    ) -> Result<()> {
        let parent = self
            .find_shard(shard_id)
            .ok_or_else(|| KinesisError::shard_not_found(shard_id, &self.stream_name))?;
        if !parent.is_open() {
            return Err(KinesisError::InvalidArgument(format!(
                "Shard {} is closed and cannot be split.",
                shard_id
            )));
        }
        let range = parent.hash_key_range;
        if new_starting_hash_key <= range.starting_hash_key
            || new_starting_hash_key >= range.ending_hash_key
        {
            return Err(KinesisError::InvalidArgument(format!(
                "NewStartingHashKey must fall strictly between {} and {}.",
                range.starting_hash_key, range.ending_hash_key
            )));
        }
        let parent_id = parent.shard_id.clone();

        let created_at_secs = (now_ms / 1000) as u32;
        let left_index = self.allocate_shard_index();
        let right_index = self.allocate_shard_index();
        let mut left = Shard::new(
            left_index,
            HashKeyRange {
                starting_hash_key: range.starting_hash_key,
                ending_hash_key: new_starting_hash_key - 1,
            },
            created_at_secs,
        );
        let mut right = Shard::new(
            right_index,
            HashKeyRange {
                starting_hash_key: new_starting_hash_key,
                ending_hash_key: range.ending_hash_key,
            },
            created_at_secs,
        );
        left.parent_shard_id = Some(parent_id.clone());
        right.parent_shard_id = Some(parent_id.clone());

        self.find_shard_mut(&parent_id)
            .expect("parent looked up above")
            .close();
        self.shards.push(left);
        self.shards.push(right);
        self.record_open_shard_count(now_ms);
        Ok(())
    }

    /// Merge two open, adjacent shards into one child covering the union of
    /// their ranges.
    pub fn merge_shards(
        &mut self,
        shard_to_merge: &str,
        adjacent_shard_to_merge: &str,
        now_ms: i64,
    ) -> Result<()> {
        if shard_to_merge == adjacent_shard_to_merge {
            return Err(KinesisError::InvalidArgument(
                "ShardToMerge and AdjacentShardToMerge must differ.".to_string(),
            ));
        }
        let first = self
            .find_shard(shard_to_merge)
            .ok_or_else(|| KinesisError::shard_not_found(shard_to_merge, &self.stream_name))?;
        let second = self.find_shard(adjacent_shard_to_merge).ok_or_else(|| {
            KinesisError::shard_not_found(adjacent_shard_to_merge, &self.stream_name)
        })?;
        if !first.is_open() || !second.is_open() {
            return Err(KinesisError::InvalidArgument(
                "Both shards of a merge must be open.".to_string(),
            ));
        }
        if !first.hash_key_range.is_adjacent_to(&second.hash_key_range) {
            return Err(KinesisError::InvalidArgument(format!(
                "Shards {} and {} are not adjacent.",
                shard_to_merge, adjacent_shard_to_merge
            )));
        }
        let union = first.hash_key_range.union(&second.hash_key_range);
        let first_id = first.shard_id.clone();
        let second_id = second.shard_id.clone();

        let created_at_secs = (now_ms / 1000) as u32;
        let child_index = self.allocate_shard_index();
        let mut child = Shard::new(child_index, union, created_at_secs);
        child.parent_shard_id = Some(first_id.clone());
        child.adjacent_parent_shard_id = Some(second_id.clone());

        self.find_shard_mut(&first_id).expect("looked up").close();
        self.find_shard_mut(&second_id).expect("looked up").close();
        self.shards.push(child);
        self.record_open_shard_count(now_ms);
        Ok(())
    }

    /// UpdateShardCount rebalance: fold the open tiling into one shard with
    /// pairwise merges, then cut it back apart along the even `target`
    /// boundaries. A new shard never has more than two parents, and every
    /// intermediate shard stays in the list with its parent links, so a
    /// reader that finishes any former shard can walk child shards hop by
    /// hop into the new tiling without losing any of the hash space.
    pub fn rebalance_to(&mut self, target: u32, now_ms: i64) -> Result<()> {
        loop {
            let mut open: Vec<(u128, String)> = self
                .open_shards()
                .map(|s| (s.hash_key_range.starting_hash_key, s.shard_id.clone()))
                .collect();
            if open.len() <= 1 {
                break;
            }
            // Sorted by starting key, the first two open shards are adjacent
            // because the open set always tiles the space.
            open.sort();
            self.merge_shards(&open[0].1, &open[1].1, now_ms)?;
        }

        for range in even_hash_ranges(target).iter().skip(1) {
            let boundary = range.starting_hash_key;
            let owner = self
                .shard_for_hash_key(boundary)
                .map(|s| s.shard_id.clone())
                .ok_or_else(|| {
                    KinesisError::InternalFailure(format!(
                        "no open shard owns boundary {} during rescale",
                        boundary
                    ))
                })?;
            self.split_shard(&owner, boundary, now_ms)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::MAX_HASH_KEY;

    fn active_stream(shard_count: u32) -> Stream {
        let mut s = Stream::new(
            "s1",
            "us-east-1",
            "000000000000",
            shard_count,
            StreamMode::Provisioned,
            1_700_000_000_000,
        );
        s.status = StreamStatus::Active;
        s
    }

    /// Open shards must tile [0, 2¹²⁸−1]: disjoint, gap-free, full cover.
    fn assert_tiles_hash_space(stream: &Stream) {
        let mut ranges: Vec<HashKeyRange> =
            stream.open_shards().map(|s| s.hash_key_range).collect();
        ranges.sort_by_key(|r| r.starting_hash_key);
        assert!(!ranges.is_empty());
        assert_eq!(ranges[0].starting_hash_key, 0);
        assert_eq!(ranges.last().unwrap().ending_hash_key, MAX_HASH_KEY);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].ending_hash_key + 1, pair[1].starting_hash_key);
        }
    }

    // ---------------------------------------------------------------
    // Construction & status
    // ---------------------------------------------------------------

    #[test]
    fn test_new_stream_starts_creating_with_full_cover() {
        let stream = Stream::new(
            "orders",
            "us-east-1",
            "000000000000",
            4,
            StreamMode::Provisioned,
            0,
        );
        assert_eq!(stream.status, StreamStatus::Creating);
        assert_eq!(stream.open_shard_count(), 4);
        assert_eq!(
            stream.stream_arn,
            "arn:aws:kinesis:us-east-1:000000000000:stream/orders"
        );
        assert_eq!(stream.retention_period_hours, MIN_RETENTION_HOURS);
        assert_tiles_hash_space(&stream);
    }

    #[test]
    fn test_require_active_rejects_other_statuses() {
        let mut stream = active_stream(1);
        assert!(stream.require_active().is_ok());
        for status in [
            StreamStatus::Creating,
            StreamStatus::Updating,
            StreamStatus::Deleting,
        ] {
            stream.status = status;
            let err = stream.require_active().unwrap_err();
            assert!(matches!(err, KinesisError::ResourceInUse(_)), "{:?}", status);
        }
    }

    #[test]
    fn test_shard_count_history_records_changes() {
        let mut stream = active_stream(2);
        assert_eq!(stream.shard_count_history.len(), 1);
        assert_eq!(stream.shard_count_history[0].open_shard_count, 2);
        stream
            .split_shard("shardId-000000000000", 1u128 << 100, 1_700_000_001_000)
            .unwrap();
        assert_eq!(stream.shard_count_history.len(), 2);
        assert_eq!(stream.shard_count_history[1].open_shard_count, 3);
    }

    // ---------------------------------------------------------------
    // Routing
    // ---------------------------------------------------------------

    #[test]
    fn test_shard_for_hash_key_picks_unique_open_shard() {
        let stream = active_stream(2);
        let low = stream.shard_for_hash_key(0).unwrap();
        let high = stream.shard_for_hash_key(MAX_HASH_KEY).unwrap();
        assert_ne!(low.shard_id, high.shard_id);
    }

    #[test]
    fn test_closed_shards_are_never_routed_to() {
        let mut stream = active_stream(1);
        let mid = 1u128 << 127;
        stream.split_shard("shardId-000000000000", mid, 0).unwrap();
        let owner = stream.shard_for_hash_key(42).unwrap();
        assert_ne!(owner.shard_id, "shardId-000000000000");
        assert!(owner.is_open());
    }

    // ---------------------------------------------------------------
    // Split
    // ---------------------------------------------------------------

    #[test]
    fn test_split_geometry() {
        let mut stream = active_stream(1);
        let mid = 1u128 << 127;
        stream
            .split_shard("shardId-000000000000", mid, 1_700_000_001_000)
            .unwrap();

        let parent = stream.find_shard("shardId-000000000000").unwrap();
        assert!(!parent.is_open());
        assert!(parent.sequence_number_range.ending_sequence_number.is_some());

        let children = stream.child_shards_of("shardId-000000000000");
        assert_eq!(children.len(), 2);
        let mut ranges: Vec<HashKeyRange> = children.iter().map(|c| c.hash_key_range).collect();
        ranges.sort_by_key(|r| r.starting_hash_key);
        assert_eq!(ranges[0].starting_hash_key, 0);
        assert_eq!(ranges[0].ending_hash_key, mid - 1);
        assert_eq!(ranges[1].starting_hash_key, mid);
        assert_eq!(ranges[1].ending_hash_key, MAX_HASH_KEY);
        for child in &children {
            assert_eq!(
                child.parent_shard_id.as_deref(),
                Some("shardId-000000000000")
            );
        }
        assert_tiles_hash_space(&stream);
    }

    #[test]
    fn test_split_rejects_boundary_keys() {
        let mut stream = active_stream(1);
        assert!(stream.split_shard("shardId-000000000000", 0, 0).is_err());
        assert!(stream
            .split_shard("shardId-000000000000", MAX_HASH_KEY, 0)
            .is_err());
    }

    #[test]
    fn test_split_rejects_closed_shard() {
        let mut stream = active_stream(1);
        stream
            .split_shard("shardId-000000000000", 1u128 << 127, 0)
            .unwrap();
        let err = stream
            .split_shard("shardId-000000000000", 1u128 << 126, 0)
            .unwrap_err();
        assert!(matches!(err, KinesisError::InvalidArgument(_)));
    }

    #[test]
    fn test_split_unknown_shard() {
        let mut stream = active_stream(1);
        let err = stream
            .split_shard("shardId-000000000099", 1u128 << 127, 0)
            .unwrap_err();
        assert!(matches!(err, KinesisError::ResourceNotFound(_)));
    }

    // ---------------------------------------------------------------
    // Merge
    // ---------------------------------------------------------------

    #[test]
    fn test_merge_geometry() {
        let mut stream = active_stream(1);
        let mid = 1u128 << 127;
        stream.split_shard("shardId-000000000000", mid, 0).unwrap();
        let children: Vec<String> = stream
            .open_shards()
            .map(|s| s.shard_id.clone())
            .collect();
        assert_eq!(children.len(), 2);

        stream
            .merge_shards(&children[0], &children[1], 1_700_000_002_000)
            .unwrap();
        assert_eq!(stream.open_shard_count(), 1);
        let child = stream.open_shards().next().unwrap();
        assert_eq!(child.hash_key_range.starting_hash_key, 0);
        assert_eq!(child.hash_key_range.ending_hash_key, MAX_HASH_KEY);
        assert_eq!(child.parent_shard_id.as_deref(), Some(children[0].as_str()));
        assert_eq!(
            child.adjacent_parent_shard_id.as_deref(),
            Some(children[1].as_str())
        );
        for id in &children {
            assert!(!stream.find_shard(id).unwrap().is_open());
        }
        assert_tiles_hash_space(&stream);
    }

    #[test]
    fn test_merge_rejects_non_adjacent() {
        let mut stream = active_stream(4);
        let ids: Vec<String> = stream.open_shards().map(|s| s.shard_id.clone()).collect();
        let err = stream.merge_shards(&ids[0], &ids[2], 0).unwrap_err();
        assert!(matches!(err, KinesisError::InvalidArgument(_)));
    }

    #[test]
    fn test_merge_rejects_same_shard_twice() {
        let mut stream = active_stream(2);
        let err = stream
            .merge_shards("shardId-000000000000", "shardId-000000000000", 0)
            .unwrap_err();
        assert!(matches!(err, KinesisError::InvalidArgument(_)));
    }

    // ---------------------------------------------------------------
    // Rebalance
    // ---------------------------------------------------------------

    #[test]
    fn test_rebalance_up_produces_even_open_layout() {
        let mut stream = active_stream(2);
        stream.rebalance_to(5, 1_700_000_003_000).unwrap();
        assert_eq!(stream.open_shard_count(), 5);
        assert_tiles_hash_space(&stream);
        // All former opens are closed and every child names a parent.
        for child in stream.open_shards() {
            assert!(child.parent_shard_id.is_some());
        }
    }

    #[test]
    fn test_rebalance_down() {
        let mut stream = active_stream(6);
        stream.rebalance_to(3, 0).unwrap();
        assert_eq!(stream.open_shard_count(), 3);
        assert_tiles_hash_space(&stream);
    }

    #[test]
    fn test_rebalance_keeps_every_former_shard_in_the_lineage() {
        // Thirds into halves: each new half overlaps two former thirds, the
        // shape that loses hash space if lineage is tracked per start key
        // only.
        let mut stream = active_stream(3);
        let originals: Vec<String> =
            stream.open_shards().map(|s| s.shard_id.clone()).collect();
        stream.rebalance_to(2, 0).unwrap();
        assert_eq!(stream.open_shard_count(), 2);
        assert_tiles_hash_space(&stream);

        // No shard of a rescale ever carries more than two parents.
        for shard in &stream.shards {
            let parents = shard.parent_shard_id.iter().count()
                + shard.adjacent_parent_shard_id.iter().count();
            assert!(parents <= 2);
        }

        // Every formerly open shard has a discoverable child, and walking
        // child shards from any of them reaches the entire new tiling.
        let open: BTreeSet<String> = stream.open_shards().map(|s| s.shard_id.clone()).collect();
        for original in &originals {
            assert!(
                !stream.child_shards_of(original).is_empty(),
                "{} lost its lineage",
                original
            );
            let mut reached = BTreeSet::new();
            let mut seen = BTreeSet::new();
            let mut frontier = vec![original.clone()];
            while let Some(id) = frontier.pop() {
                if !seen.insert(id.clone()) {
                    continue;
                }
                if open.contains(&id) {
                    reached.insert(id);
                    continue;
                }
                frontier.extend(
                    stream
                        .child_shards_of(&id)
                        .iter()
                        .map(|c| c.shard_id.clone()),
                );
            }
            assert_eq!(reached, open, "walk from {} missed open shards", original);
        }
    }

    #[test]
    fn test_shard_ids_never_reused_across_operations() {
        let mut stream = active_stream(2);
        stream.rebalance_to(2, 0).unwrap();
        let first_open = stream.open_shards().next().unwrap().shard_id.clone();
        stream.split_shard(&first_open, 1u128 << 126, 0).unwrap();
        let mut ids: Vec<&str> = stream.shards.iter().map(|s| s.shard_id.as_str()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    // ---------------------------------------------------------------
    // Metrics names
    // ---------------------------------------------------------------

    #[test]
    fn test_metric_names_roundtrip() {
        for metric in ShardLevelMetric::ALL {
            assert_eq!(ShardLevelMetric::from_name(metric.as_str()), Some(metric));
        }
        assert_eq!(ShardLevelMetric::from_name("ALL"), None);
        assert_eq!(ShardLevelMetric::from_name("Nonsense"), None);
    }

    #[test]
    fn test_retention_cutoff() {
        let stream = active_stream(1);
        let now = 1_700_000_000_000i64;
        assert_eq!(stream.retention_cutoff_ms(now), now - 24 * 3_600_000);
    }
}
