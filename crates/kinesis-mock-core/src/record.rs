//! The stored form of a single data record.
//!
//! Payloads are `bytes::Bytes` so that readers share the same allocation the
//! write path created; a record is never mutated after it is appended.

use crate::sequence::SequenceNumber;
use crate::stream::EncryptionType;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Maximum payload size accepted by PutRecord/PutRecords (1 MiB).
pub const MAX_DATA_BYTES: usize = 1024 * 1024;

/// A single record stored in a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub sequence_number: SequenceNumber,

    /// Arrival time in milliseconds since epoch. Non-decreasing within a
    /// shard.
    pub approximate_arrival_timestamp_ms: i64,

    pub partition_key: String,

    pub data: Bytes,

    /// Encryption state of the stream at the moment the record arrived.
    pub encryption_type: EncryptionType,
}

impl Record {
    /// Payload size as counted against the per-shard throughput quota:
    /// data plus the partition key.
    pub fn payload_size(&self) -> usize {
        self.data.len() + self.partition_key.len()
    }
}
