//! Shards and Hash-Key Arithmetic
//!
//! A shard owns a contiguous range of the 128-bit hash-key space and an
//! append-only run of records. The whole space is [0, 2¹²⁸−1], represented
//! directly as `u128`, and the open shards of a stream always tile it
//! exactly: disjoint ranges whose union is the full space.
//!
//! ## Geometry
//!
//! - A **split** replaces one open shard by two children that cut its range
//!   at a chosen key.
//! - A **merge** replaces two adjacent open shards by one child covering the
//!   union of their ranges.
//! - A **rebalance** (UpdateShardCount) is a chain of pairwise merges that
//!   folds the open shards into one, followed by splits along an even
//!   target tiling.
//!
//! Closing a shard stamps its `ending_sequence_number`, which is always at
//! least the sequence number of every record the shard holds. Closed shards
//! never accept new records; their stored records survive until retention
//! expiry.
//!
//! ## Routing
//!
//! PutRecord routes by the record's explicit hash key when present, else by
//! MD5 of the partition key interpreted as a big-endian 128-bit unsigned
//! integer, the same function the real service documents.

use crate::error::{KinesisError, Result};
use crate::record::Record;
use crate::sequence::{SequenceNumber, SequenceParts};
use crate::stream::EncryptionType;
use bytes::Bytes;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Largest hash key: 2¹²⁸ − 1.
pub const MAX_HASH_KEY: u128 = u128::MAX;

/// Inclusive range of hash keys owned by a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashKeyRange {
    pub starting_hash_key: u128,
    pub ending_hash_key: u128,
}

impl HashKeyRange {
    pub fn contains(&self, hash_key: u128) -> bool {
        self.starting_hash_key <= hash_key && hash_key <= self.ending_hash_key
    }

    /// True when the two ranges touch with no gap, in either order.
    pub fn is_adjacent_to(&self, other: &HashKeyRange) -> bool {
        (self.ending_hash_key != MAX_HASH_KEY
            && self.ending_hash_key + 1 == other.starting_hash_key)
            || (other.ending_hash_key != MAX_HASH_KEY
                && other.ending_hash_key + 1 == self.starting_hash_key)
    }

    /// Union of two adjacent ranges.
    pub fn union(&self, other: &HashKeyRange) -> HashKeyRange {
        HashKeyRange {
            starting_hash_key: self.starting_hash_key.min(other.starting_hash_key),
            ending_hash_key: self.ending_hash_key.max(other.ending_hash_key),
        }
    }
}

/// Tile [0, 2¹²⁸−1] into `n` contiguous ranges whose sizes differ by at most
/// one key.
pub fn even_hash_ranges(n: u32) -> Vec<HashKeyRange> {
    debug_assert!(n > 0);
    let n = u128::from(n);
    // 2^128 = n·q + r with r in 1..=n (computed through u128::MAX to avoid
    // representing 2^128 itself).
    let q = MAX_HASH_KEY / n;
    let r = MAX_HASH_KEY % n + 1;

    let mut ranges = Vec::with_capacity(n as usize);
    let mut start: u128 = 0;
    for i in 0..n {
        let end = if i < r { start + q } else { start + q - 1 };
        ranges.push(HashKeyRange {
            starting_hash_key: start,
            ending_hash_key: end,
        });
        start = end.wrapping_add(1);
    }
    ranges
}

/// MD5 of the partition key as a big-endian 128-bit unsigned integer.
pub fn partition_key_hash(partition_key: &str) -> u128 {
    let digest = Md5::digest(partition_key.as_bytes());
    u128::from_be_bytes(digest.into())
}

/// Sequence-number span of a shard. `ending_sequence_number` is present
/// exactly when the shard is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceNumberRange {
    pub starting_sequence_number: SequenceNumber,
    pub ending_sequence_number: Option<SequenceNumber>,
}

/// A shard: one unit of parallel capacity within a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shard {
    pub shard_id: String,

    /// Ordinal of this shard within its stream; baked into every sequence
    /// number the shard allocates.
    pub index: u32,

    pub hash_key_range: HashKeyRange,
    pub sequence_number_range: SequenceNumberRange,

    pub parent_shard_id: Option<String>,
    pub adjacent_parent_shard_id: Option<String>,

    /// Shard creation time in unix seconds (the date component of its
    /// sequence numbers).
    pub created_at_secs: u32,

    /// Stored records, ordered by (arrival timestamp, sequence number).
    pub records: Vec<Record>,

    // Allocation state. Restored verbatim from snapshots so sequence numbers
    // stay strictly monotonic across a restart.
    bytes_written: u64,
    last_issued: Option<(u64, u16)>,
}

impl Shard {
    /// `shardId-` followed by the zero-padded 12-digit ordinal.
    pub fn shard_id_for_index(index: u32) -> String {
        format!("shardId-{:012}", index)
    }

    pub fn new(index: u32, hash_key_range: HashKeyRange, created_at_secs: u32) -> Shard {
        let starting = SequenceNumber::encode(SequenceParts {
            shard_index: index,
            byte_offset: 0,
            sub_sequence: 0,
            shard_creation_secs: created_at_secs,
        })
        .expect("zero byte offset always encodes");
        Shard {
            shard_id: Self::shard_id_for_index(index),
            index,
            hash_key_range,
            sequence_number_range: SequenceNumberRange {
                starting_sequence_number: starting,
                ending_sequence_number: None,
            },
            parent_shard_id: None,
            adjacent_parent_shard_id: None,
            created_at_secs,
            records: Vec::new(),
            bytes_written: 0,
            last_issued: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.sequence_number_range.ending_sequence_number.is_none()
    }

    pub fn contains_hash_key(&self, hash_key: u128) -> bool {
        self.hash_key_range.contains(hash_key)
    }

    /// Cumulative payload bytes appended since shard creation.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append a record, allocating the next sequence number. The byte offset
    /// is the cumulative payload length before this record; the sub-sequence
    /// increments only while the offset stands still (zero-length payloads).
    /// Arrival timestamps are clamped to be non-decreasing.
    pub fn append(
        &mut self,
        data: Bytes,
        partition_key: String,
        encryption_type: EncryptionType,
        now_ms: i64,
    ) -> Result<SequenceNumber> {
        if !self.is_open() {
            return Err(KinesisError::InternalFailure(format!(
                "attempted append to closed shard {}",
                self.shard_id
            )));
        }

        let byte_offset = self.bytes_written;
        let sub_sequence = match self.last_issued {
            Some((offset, sub)) if offset == byte_offset => sub + 1,
            _ => 0,
        };
        let sequence_number = SequenceNumber::encode(SequenceParts {
            shard_index: self.index,
            byte_offset,
            sub_sequence,
            shard_creation_secs: self.created_at_secs,
        })
        .map_err(|e| KinesisError::InternalFailure(e.to_string()))?;

        self.last_issued = Some((byte_offset, sub_sequence));
        self.bytes_written += data.len() as u64;

        let arrival = match self.records.last() {
            Some(last) => now_ms.max(last.approximate_arrival_timestamp_ms),
            None => now_ms,
        };
        self.records.push(Record {
            sequence_number,
            approximate_arrival_timestamp_ms: arrival,
            partition_key,
            data,
            encryption_type,
        });
        Ok(sequence_number)
    }

    /// Close the shard, stamping an ending sequence number that is ≥ every
    /// stored record's.
    pub fn close(&mut self) {
        if !self.is_open() {
            return;
        }
        let (byte_offset, sub_sequence) = match self.last_issued {
            Some((offset, sub)) if offset == self.bytes_written => (offset, sub),
            _ => (self.bytes_written, 0),
        };
        let ending = SequenceNumber::encode(SequenceParts {
            shard_index: self.index,
            byte_offset,
            sub_sequence,
            shard_creation_secs: self.created_at_secs,
        })
        .expect("ending offset already fit when allocated");
        self.sequence_number_range.ending_sequence_number = Some(ending);
    }

    /// Index of the first record with sequence number ≥ (or > when not
    /// inclusive) the given one.
    pub fn first_index_by_sequence(&self, seq: SequenceNumber, inclusive: bool) -> usize {
        self.records.partition_point(|r| {
            if inclusive {
                r.sequence_number < seq
            } else {
                r.sequence_number <= seq
            }
        })
    }

    /// Index of the first record that arrived at or after the timestamp.
    pub fn first_index_by_timestamp(&self, timestamp_ms: i64) -> usize {
        self.records
            .partition_point(|r| r.approximate_arrival_timestamp_ms < timestamp_ms)
    }

    /// Drop records that arrived before the cutoff. Returns how many were
    /// purged.
    pub fn purge_records_before(&mut self, cutoff_ms: i64) -> usize {
        let keep_from = self
            .records
            .partition_point(|r| r.approximate_arrival_timestamp_ms < cutoff_ms);
        self.records.drain(..keep_from).count()
    }
}
