//! Per-Shard Throughput Quotas
//!
//! Token buckets guard each shard's write path (1 MiB/s of payload and 1000
//! records/s) and read path (5 GetRecords calls/s). Buckets refill
//! continuously based on elapsed clock time; there is no window-reset task,
//! a caller that waits long enough always finds capacity again.
//!
//! PutRecord and PutRecords draw from the same pair of buckets, checked
//! record-by-record in arrival order; an entry that fails the check consumes
//! nothing, so later smaller entries may still pass.
//!
//! Throttle state is runtime-only: it is not part of snapshots, and buckets
//! start full after a restart.

use std::collections::HashMap;

/// Default per-shard write quota: 1 MiB of payload per second.
pub const WRITE_BYTES_PER_SEC: f64 = 1024.0 * 1024.0;
/// Default per-shard write quota: 1000 records per second.
pub const WRITE_RECORDS_PER_SEC: f64 = 1000.0;
/// Default per-shard read quota: 5 GetRecords calls per second.
pub const READ_CALLS_PER_SEC: f64 = 5.0;

#[derive(Debug, Clone)]
struct TokenBucket {
    capacity: f64,
    rate_per_sec: f64,
    tokens: f64,
    last_refill_ms: i64,
}

impl TokenBucket {
    fn new(rate_per_sec: f64, capacity: f64, now_ms: i64) -> Self {
        Self {
            capacity,
            rate_per_sec,
            tokens: capacity,
            last_refill_ms: now_ms,
        }
    }

    fn refill(&mut self, now_ms: i64) {
        let elapsed_ms = now_ms.saturating_sub(self.last_refill_ms);
        if elapsed_ms <= 0 {
            return;
        }
        self.tokens =
            (self.tokens + self.rate_per_sec * elapsed_ms as f64 / 1000.0).min(self.capacity);
        self.last_refill_ms = now_ms;
    }

    /// Take `amount` tokens if available; on refusal nothing is consumed.
    fn try_acquire(&mut self, amount: f64, now_ms: i64) -> bool {
        self.refill(now_ms);
        if self.tokens >= amount {
            self.tokens -= amount;
            true
        } else {
            false
        }
    }
}

/// The bucket pair (plus read bucket) for one shard.
#[derive(Debug, Clone)]
pub struct ShardThrottle {
    write_bytes: TokenBucket,
    write_records: TokenBucket,
    read_calls: TokenBucket,
}

impl ShardThrottle {
    pub fn new(now_ms: i64) -> Self {
        Self {
            write_bytes: TokenBucket::new(WRITE_BYTES_PER_SEC, WRITE_BYTES_PER_SEC, now_ms),
            write_records: TokenBucket::new(WRITE_RECORDS_PER_SEC, WRITE_RECORDS_PER_SEC, now_ms),
            read_calls: TokenBucket::new(READ_CALLS_PER_SEC, READ_CALLS_PER_SEC, now_ms),
        }
    }

    /// Admit one record of `payload_bytes` (data + partition key). Both
    /// buckets must have room; a refusal consumes neither.
    pub fn try_write(&mut self, payload_bytes: usize, now_ms: i64) -> bool {
        self.write_bytes.refill(now_ms);
        self.write_records.refill(now_ms);
        if self.write_bytes.tokens >= payload_bytes as f64 && self.write_records.tokens >= 1.0 {
            self.write_bytes.tokens -= payload_bytes as f64;
            self.write_records.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Admit one GetRecords call.
    pub fn try_read(&mut self, now_ms: i64) -> bool {
        self.read_calls.try_acquire(1.0, now_ms)
    }
}

/// Throttle state for every shard of a region, keyed by (stream, shard id).
/// Entries are created lazily and never removed; a deleted stream's entries
/// are garbage but bounded by the shard ids that ever existed.
#[derive(Debug, Default)]
pub struct ThrottleMap {
    shards: HashMap<(String, String), ShardThrottle>,
}

impl ThrottleMap {
    pub fn shard(&mut self, stream_name: &str, shard_id: &str, now_ms: i64) -> &mut ShardThrottle {
        self.shards
            .entry((stream_name.to_string(), shard_id.to_string()))
            .or_insert_with(|| ShardThrottle::new(now_ms))
    }
}
