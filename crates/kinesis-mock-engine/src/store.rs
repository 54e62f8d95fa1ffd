//! Per-Region Store
//!
//! The store is the unit of consistency: one `RwLock` around everything a
//! region owns. Mutations commit atomically or not at all (handlers build
//! their whole result under the write guard and only then return) and reads
//! observe the last committed state. Cross-region consistency is
//! deliberately unspecified; the coordinator never holds two region locks at
//! once.
//!
//! ## What lives inside
//!
//! - `streams`: every stream of the region, keyed by name
//! - `throttles`: per-shard token buckets (runtime-only, skipped by serde so
//!   snapshots never carry them)
//!
//! The lock is `tokio::sync::RwLock`, so a handler waiting for the region
//! yields instead of blocking a worker thread.

use crate::throttle::ThrottleMap;
use kinesis_mock_core::{KinesisError, Result, Stream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Everything one region owns, behind one lock.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegionState {
    pub region: String,
    pub account_id: String,
    pub streams: BTreeMap<String, Stream>,

    #[serde(skip)]
    pub throttles: ThrottleMap,
}

impl RegionState {
    pub fn new(region: &str, account_id: &str) -> Self {
        Self {
            region: region.to_string(),
            account_id: account_id.to_string(),
            streams: BTreeMap::new(),
            throttles: ThrottleMap::default(),
        }
    }

    /// Look up a stream or produce the standard not-found error.
    pub fn stream(&self, stream_name: &str) -> Result<&Stream> {
        self.streams
            .get(stream_name)
            .ok_or_else(|| KinesisError::stream_not_found(stream_name, &self.account_id))
    }

    pub fn stream_mut(&mut self, stream_name: &str) -> Result<&mut Stream> {
        let account_id = self.account_id.clone();
        self.streams
            .get_mut(stream_name)
            .ok_or_else(|| KinesisError::stream_not_found(stream_name, &account_id))
    }

    /// Open shards across every stream of the region (the per-account limit
    /// is enforced against this).
    pub fn total_open_shards(&self) -> u32 {
        self.streams.values().map(|s| s.open_shard_count()).sum()
    }

    pub fn on_demand_stream_count(&self) -> u32 {
        self.streams
            .values()
            .filter(|s| s.mode == kinesis_mock_core::StreamMode::OnDemand)
            .count() as u32
    }
}

/// The lock around one region's state.
pub struct RegionStore {
    state: RwLock<RegionState>,
}

impl RegionStore {
    pub fn new(state: RegionState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Run a read against the last committed state.
    pub async fn read<T>(&self, f: impl FnOnce(&RegionState) -> Result<T>) -> Result<T> {
        let guard = self.state.read().await;
        f(&guard)
    }

    /// Run a mutation under the write lock. The closure's error aborts the
    /// whole mutation (callers must not partially apply before returning
    /// one).
    pub async fn mutate<T>(&self, f: impl FnOnce(&mut RegionState) -> Result<T>) -> Result<T> {
        let mut guard = self.state.write().await;
        f(&mut guard)
    }

    /// Clone the region's persistent state for a snapshot. Taken under the
    /// read lock, so the copy is one logical instant of the region.
    pub async fn snapshot_state(&self) -> RegionState {
        let guard = self.state.read().await;
        RegionState {
            region: guard.region.clone(),
            account_id: guard.account_id.clone(),
            streams: guard.streams.clone(),
            throttles: ThrottleMap::default(),
        }
    }
}
