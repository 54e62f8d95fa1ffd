//! Engine Configuration
//!
//! Everything the state engine needs to know about its identity, limits, and
//! transition delays. The server crate builds this from environment
//! variables; tests build it inline with short delays.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Account id stamped into every ARN (default: 000000000000).
    pub account_id: String,

    /// Region used when a request carries none.
    pub default_region: String,

    /// Per-account open-shard limit (default: 50).
    #[serde(default = "default_shard_limit")]
    pub shard_limit: u32,

    /// Maximum concurrent ON_DEMAND streams per account (default: 10).
    #[serde(default = "default_on_demand_stream_count_limit")]
    pub on_demand_stream_count_limit: u32,

    /// Delay for CREATING → ACTIVE (default: 500ms).
    #[serde(default = "default_transition_ms")]
    pub create_stream_duration_ms: u64,

    /// Delay for DELETING → removed (default: 500ms).
    #[serde(default = "default_transition_ms")]
    pub delete_stream_duration_ms: u64,

    /// Delay for UPDATING → ACTIVE and consumer transitions (default: 500ms).
    #[serde(default = "default_transition_ms")]
    pub update_stream_duration_ms: u64,

    /// Interval between retention GC sweeps (default: 60s).
    #[serde(default = "default_retention_gc_interval_ms")]
    pub retention_gc_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            account_id: "000000000000".to_string(),
            default_region: "us-east-1".to_string(),
            shard_limit: default_shard_limit(),
            on_demand_stream_count_limit: default_on_demand_stream_count_limit(),
            create_stream_duration_ms: default_transition_ms(),
            delete_stream_duration_ms: default_transition_ms(),
            update_stream_duration_ms: default_transition_ms(),
            retention_gc_interval_ms: default_retention_gc_interval_ms(),
        }
    }
}

impl EngineConfig {
    pub fn create_stream_duration(&self) -> Duration {
        Duration::from_millis(self.create_stream_duration_ms)
    }

    /// Per-stream open-shard ceiling, which depends on the capacity mode.
    pub fn per_stream_shard_limit(&self, on_demand: bool) -> u32 {
        if on_demand {
            500
        } else {
            self.shard_limit
        }
    }
}

fn default_shard_limit() -> u32 {
    50
}

fn default_on_demand_stream_count_limit() -> u32 {
    10
}

fn default_transition_ms() -> u64 {
    500
}

fn default_retention_gc_interval_ms() -> u64 {
    60_000
}
