//! The Coordinator
//!
//! `Cache` owns the whole engine: the region → store map, the transition
//! queue, the clock, and the configuration. It is the union API the server
//! boundary calls: one async method per operation, each taking the region
//! resolved from the request (or `None` for the configured default).
//!
//! ## Concurrency contract
//!
//! - Operations against different regions proceed concurrently.
//! - Operations against one region serialize on that region's store lock.
//! - No code path ever holds two region locks at once (snapshots visit
//!   regions one at a time, so each region appears at a single logical
//!   instant even though regions may differ slightly).
//!
//! ## Scheduling
//!
//! Mutations hand delayed transitions back through the store; the cache
//! enqueues them and the scheduling loop ([`Cache::run_scheduler`]) fires
//! them when due. Tests skip the loop: advance a `ManualClock` and call
//! [`Cache::fire_due`] directly for deterministic transitions.

use crate::api::*;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::ops::{self, OpCtx};
use crate::scheduler::{apply_transition, DelayedTransition, Transition, TransitionQueue};
use crate::snapshot::Snapshot;
use crate::store::{RegionState, RegionStore};
use kinesis_mock_core::{KinesisError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

/// Loose shape check for region names like `us-east-1` or `ap-southeast-3`.
fn is_valid_region(region: &str) -> bool {
    let segments: Vec<&str> = region.split('-').collect();
    segments.len() >= 3
        && segments
            .iter()
            .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()))
        && segments
            .last()
            .map(|s| s.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
}

pub struct Cache {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    regions: RwLock<HashMap<String, Arc<RegionStore>>>,
    queue: TransitionQueue,
}

impl Cache {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            config,
            clock,
            regions: RwLock::new(HashMap::new()),
            queue: TransitionQueue::default(),
        })
    }

    /// Rebuild a cache from a snapshot: region states verbatim, pending
    /// transitions re-enqueued (overdue ones fire on the first tick).
    pub fn restore(config: EngineConfig, clock: Arc<dyn Clock>, snapshot: Snapshot) -> Arc<Self> {
        let cache = Self::new(config, clock);
        {
            let mut regions = cache
                .regions
                .try_write()
                .expect("fresh cache has no other lock holders");
            for state in snapshot.regions {
                regions.insert(state.region.clone(), Arc::new(RegionStore::new(state)));
            }
        }
        cache.queue.push_all(snapshot.pending);
        info!(pending = cache.queue.len(), "restored engine from snapshot");
        cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn resolve_region(&self, region: Option<&str>) -> Result<String> {
        match region {
            None => Ok(self.config.default_region.clone()),
            Some(region) if is_valid_region(region) => Ok(region.to_string()),
            Some(region) => Err(KinesisError::InvalidArgument(format!(
                "{} is not a valid region",
                region
            ))),
        }
    }

    /// Get the region's store, creating it (and scheduling its retention
    /// sweep) on first touch.
    async fn store(&self, region: &str) -> Arc<RegionStore> {
        if let Some(store) = self.regions.read().await.get(region) {
            return store.clone();
        }
        let mut regions = self.regions.write().await;
        regions
            .entry(region.to_string())
            .or_insert_with(|| {
                debug!(region, "initializing region store");
                self.queue.push(DelayedTransition {
                    region: region.to_string(),
                    due_at_ms: self.clock.now_ms() + self.config.retention_gc_interval_ms as i64,
                    transition: Transition::RetentionSweep {
                        interval_ms: self.config.retention_gc_interval_ms,
                    },
                });
                Arc::new(RegionStore::new(RegionState::new(
                    region,
                    &self.config.account_id,
                )))
            })
            .clone()
    }

    /// Shared shape of every mutating operation: resolve the region, run the
    /// handler under the write lock, enqueue whatever it scheduled.
    async fn mutate_op<Req, Resp>(
        &self,
        region: Option<&str>,
        req: &Req,
        handler: impl FnOnce(&mut RegionState, &Req, &OpCtx) -> Result<(Resp, Vec<DelayedTransition>)>,
    ) -> Result<Resp> {
        let region = self.resolve_region(region)?;
        let store = self.store(&region).await;
        let ctx = OpCtx {
            config: &self.config,
            now_ms: self.clock.now_ms(),
        };
        let (response, transitions) = store.mutate(|state| handler(state, req, &ctx)).await?;
        self.queue.push_all(transitions);
        Ok(response)
    }

    /// Shared shape of every read operation.
    async fn read_op<Req, Resp>(
        &self,
        region: Option<&str>,
        req: &Req,
        handler: impl FnOnce(&RegionState, &Req, &OpCtx) -> Result<Resp>,
    ) -> Result<Resp> {
        let region = self.resolve_region(region)?;
        let store = self.store(&region).await;
        let ctx = OpCtx {
            config: &self.config,
            now_ms: self.clock.now_ms(),
        };
        store.read(|state| handler(state, req, &ctx)).await
    }

    // -----------------------------------------------------------------
    // Stream lifecycle
    // -----------------------------------------------------------------

    pub async fn create_stream(
        &self,
        region: Option<&str>,
        req: &CreateStreamRequest,
    ) -> Result<EmptyResponse> {
        self.mutate_op(region, req, ops::streams::create_stream).await
    }

    pub async fn delete_stream(
        &self,
        region: Option<&str>,
        req: &DeleteStreamRequest,
    ) -> Result<EmptyResponse> {
        self.mutate_op(region, req, ops::streams::delete_stream).await
    }

    pub async fn describe_stream(
        &self,
        region: Option<&str>,
        req: &DescribeStreamRequest,
    ) -> Result<DescribeStreamResponse> {
        self.read_op(region, req, |state, req, _| ops::streams::describe_stream(state, req))
            .await
    }

    pub async fn describe_stream_summary(
        &self,
        region: Option<&str>,
        req: &DescribeStreamSummaryRequest,
    ) -> Result<DescribeStreamSummaryResponse> {
        self.read_op(region, req, |state, req, _| {
            ops::streams::describe_stream_summary(state, req)
        })
        .await
    }

    pub async fn list_streams(
        &self,
        region: Option<&str>,
        req: &ListStreamsRequest,
    ) -> Result<ListStreamsResponse> {
        self.read_op(region, req, |state, req, _| ops::streams::list_streams(state, req))
            .await
    }

    pub async fn update_stream_mode(
        &self,
        region: Option<&str>,
        req: &UpdateStreamModeRequest,
    ) -> Result<EmptyResponse> {
        self.mutate_op(region, req, ops::streams::update_stream_mode)
            .await
    }

    // -----------------------------------------------------------------
    // Shard topology
    // -----------------------------------------------------------------

    pub async fn list_shards(
        &self,
        region: Option<&str>,
        req: &ListShardsRequest,
    ) -> Result<ListShardsResponse> {
        self.read_op(region, req, ops::shards::list_shards).await
    }

    pub async fn split_shard(
        &self,
        region: Option<&str>,
        req: &SplitShardRequest,
    ) -> Result<EmptyResponse> {
        self.mutate_op(region, req, ops::shards::split_shard).await
    }

    pub async fn merge_shards(
        &self,
        region: Option<&str>,
        req: &MergeShardsRequest,
    ) -> Result<EmptyResponse> {
        self.mutate_op(region, req, ops::shards::merge_shards).await
    }

    pub async fn update_shard_count(
        &self,
        region: Option<&str>,
        req: &UpdateShardCountRequest,
    ) -> Result<UpdateShardCountResponse> {
        self.mutate_op(region, req, ops::shards::update_shard_count)
            .await
    }

    // -----------------------------------------------------------------
    // Data plane
    // -----------------------------------------------------------------

    pub async fn put_record(
        &self,
        region: Option<&str>,
        req: &PutRecordRequest,
    ) -> Result<PutRecordResponse> {
        self.mutate_op(region, req, ops::records::put_record).await
    }

    pub async fn put_records(
        &self,
        region: Option<&str>,
        req: &PutRecordsRequest,
    ) -> Result<PutRecordsResponse> {
        self.mutate_op(region, req, ops::records::put_records).await
    }

    pub async fn get_shard_iterator(
        &self,
        region: Option<&str>,
        req: &GetShardIteratorRequest,
    ) -> Result<GetShardIteratorResponse> {
        self.read_op(region, req, ops::records::get_shard_iterator)
            .await
    }

    /// GetRecords consumes read quota, so it runs as a mutation.
    pub async fn get_records(
        &self,
        region: Option<&str>,
        req: &GetRecordsRequest,
    ) -> Result<GetRecordsResponse> {
        self.mutate_op(region, req, ops::records::get_records).await
    }

    // -----------------------------------------------------------------
    // Tags, retention, encryption, monitoring
    // -----------------------------------------------------------------

    pub async fn add_tags_to_stream(
        &self,
        region: Option<&str>,
        req: &AddTagsToStreamRequest,
    ) -> Result<EmptyResponse> {
        self.mutate_op(region, req, ops::tags::add_tags_to_stream).await
    }

    pub async fn remove_tags_from_stream(
        &self,
        region: Option<&str>,
        req: &RemoveTagsFromStreamRequest,
    ) -> Result<EmptyResponse> {
        self.mutate_op(region, req, ops::tags::remove_tags_from_stream)
            .await
    }

    pub async fn list_tags_for_stream(
        &self,
        region: Option<&str>,
        req: &ListTagsForStreamRequest,
    ) -> Result<ListTagsForStreamResponse> {
        self.read_op(region, req, |state, req, _| ops::tags::list_tags_for_stream(state, req))
            .await
    }

    pub async fn increase_stream_retention_period(
        &self,
        region: Option<&str>,
        req: &RetentionPeriodRequest,
    ) -> Result<EmptyResponse> {
        self.mutate_op(region, req, ops::retention::increase_stream_retention_period)
            .await
    }

    pub async fn decrease_stream_retention_period(
        &self,
        region: Option<&str>,
        req: &RetentionPeriodRequest,
    ) -> Result<EmptyResponse> {
        self.mutate_op(region, req, ops::retention::decrease_stream_retention_period)
            .await
    }

    pub async fn start_stream_encryption(
        &self,
        region: Option<&str>,
        req: &StreamEncryptionRequest,
    ) -> Result<EmptyResponse> {
        self.mutate_op(region, req, ops::encryption::start_stream_encryption)
            .await
    }

    pub async fn stop_stream_encryption(
        &self,
        region: Option<&str>,
        req: &StreamEncryptionRequest,
    ) -> Result<EmptyResponse> {
        self.mutate_op(region, req, ops::encryption::stop_stream_encryption)
            .await
    }

    pub async fn enable_enhanced_monitoring(
        &self,
        region: Option<&str>,
        req: &EnhancedMonitoringRequest,
    ) -> Result<EnhancedMonitoringResponse> {
        self.mutate_op(region, req, ops::monitoring::enable_enhanced_monitoring)
            .await
    }

    pub async fn disable_enhanced_monitoring(
        &self,
        region: Option<&str>,
        req: &EnhancedMonitoringRequest,
    ) -> Result<EnhancedMonitoringResponse> {
        self.mutate_op(region, req, ops::monitoring::disable_enhanced_monitoring)
            .await
    }

    pub async fn describe_limits(
        &self,
        region: Option<&str>,
        req: &DescribeLimitsRequest,
    ) -> Result<DescribeLimitsResponse> {
        self.read_op(region, req, |state, _req, ctx| {
            ops::monitoring::describe_limits(state, ctx)
        })
        .await
    }

    // -----------------------------------------------------------------
    // Consumers
    // -----------------------------------------------------------------

    pub async fn register_stream_consumer(
        &self,
        region: Option<&str>,
        req: &RegisterStreamConsumerRequest,
    ) -> Result<RegisterStreamConsumerResponse> {
        self.mutate_op(region, req, ops::consumers::register_stream_consumer)
            .await
    }

    pub async fn deregister_stream_consumer(
        &self,
        region: Option<&str>,
        req: &DeregisterStreamConsumerRequest,
    ) -> Result<EmptyResponse> {
        self.mutate_op(region, req, ops::consumers::deregister_stream_consumer)
            .await
    }

    pub async fn describe_stream_consumer(
        &self,
        region: Option<&str>,
        req: &DescribeStreamConsumerRequest,
    ) -> Result<DescribeStreamConsumerResponse> {
        self.read_op(region, req, |state, req, _| {
            ops::consumers::describe_stream_consumer(state, req)
        })
        .await
    }

    pub async fn list_stream_consumers(
        &self,
        region: Option<&str>,
        req: &ListStreamConsumersRequest,
    ) -> Result<ListStreamConsumersResponse> {
        self.read_op(region, req, ops::consumers::list_stream_consumers)
            .await
    }

    /// SubscribeToShard needs an HTTP/2 event stream the emulator does not
    /// speak.
    pub fn subscribe_to_shard(&self) -> KinesisError {
        KinesisError::InvalidArgument(
            "SubscribeToShard requires HTTP/2 event streaming, which this emulator does not support."
                .to_string(),
        )
    }

    // -----------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------

    /// Apply every transition that is due. Looping until the queue yields
    /// nothing due also covers follow-ups that became due immediately.
    pub async fn fire_due(&self) {
        loop {
            let due = self.queue.pop_due(self.clock.now_ms());
            if due.is_empty() {
                return;
            }
            for delayed in due {
                let store = self.store(&delayed.region).await;
                let now_ms = self.clock.now_ms();
                let followups = store
                    .mutate(|state| Ok(apply_transition(state, &delayed.transition, now_ms)))
                    .await
                    .unwrap_or_default();
                self.queue.push_all(followups);
            }
        }
    }

    /// The scheduling loop: sleep until the earliest due entry (or until one
    /// is pushed), fire, repeat. Runs until `shutdown` flips to true.
    pub async fn run_scheduler(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let wait = async {
                match self.queue.next_due_ms() {
                    Some(due) => self.clock.sleep_until(due).await,
                    None => self.queue.pushed().await,
                }
            };
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = wait => self.fire_due().await,
            }
        }
        info!("scheduler loop stopped");
    }

    // -----------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------

    /// Serialize every region plus the pending transition queue. Each
    /// region's state is copied under its own read lock.
    pub async fn snapshot(&self) -> Snapshot {
        let stores: Vec<Arc<RegionStore>> = self.regions.read().await.values().cloned().collect();
        let mut regions = Vec::with_capacity(stores.len());
        for store in stores {
            regions.push(store.snapshot_state().await);
        }
        regions.sort_by(|a, b| a.region.cmp(&b.region));
        Snapshot {
            version: crate::snapshot::SNAPSHOT_VERSION,
            saved_at_ms: self.clock.now_ms(),
            regions,
            pending: self.queue.pending(),
        }
    }

    /// Number of pending scheduler entries (diagnostics).
    pub fn pending_transitions(&self) -> usize {
        self.queue.len()
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("default_region", &self.config.default_region)
            .field("pending_transitions", &self.queue.len())
            .finish()
    }
}
