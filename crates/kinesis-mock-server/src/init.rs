//! Boot-Time Stream Pre-Initialization
//!
//! `INITIALIZE_STREAMS` names streams the emulator creates before serving so
//! test suites can point a client at a ready-made topology. Regions run
//! concurrently; within one region creations are bounded by a semaphore,
//! then each creation polls DescribeStreamSummary until the stream has left
//! CREATING, as a bounded loop of 3 attempts spaced by the create delay, no
//! retry framework needed.

use crate::config::InitStream;
use kinesis_mock_core::KinesisError;
use kinesis_mock_engine::api::{CreateStreamRequest, DescribeStreamSummaryRequest};
use kinesis_mock_engine::{Cache, Clock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Concurrent creations allowed per region.
const CREATE_CONCURRENCY: usize = 5;
/// DescribeStreamSummary polls per stream before giving up.
const POLL_ATTEMPTS: u32 = 3;

pub async fn initialize_streams(cache: &Arc<Cache>, streams: &[InitStream]) {
    if streams.is_empty() {
        return;
    }
    info!(count = streams.len(), "pre-initializing streams");

    let mut by_region: BTreeMap<Option<String>, Vec<InitStream>> = BTreeMap::new();
    for stream in streams {
        by_region
            .entry(stream.region.clone())
            .or_default()
            .push(stream.clone());
    }

    let mut region_tasks = Vec::new();
    for (region, streams) in by_region {
        let cache = cache.clone();
        region_tasks.push(tokio::spawn(async move {
            initialize_region(&cache, region.as_deref(), &streams).await;
        }));
    }
    for task in region_tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "pre-init region task panicked");
        }
    }
}

async fn initialize_region(cache: &Arc<Cache>, region: Option<&str>, streams: &[InitStream]) {
    let semaphore = Arc::new(Semaphore::new(CREATE_CONCURRENCY));
    let mut tasks = Vec::new();
    for stream in streams {
        let cache = cache.clone();
        let semaphore = semaphore.clone();
        let stream = stream.clone();
        let region = region.map(str::to_string);
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            create_and_await(&cache, region.as_deref(), &stream).await;
        }));
    }
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "pre-init stream task panicked");
        }
    }
}

async fn create_and_await(cache: &Arc<Cache>, region: Option<&str>, stream: &InitStream) {
    let request = CreateStreamRequest {
        stream_name: Some(stream.name.clone()),
        shard_count: Some(i64::from(stream.shard_count)),
        stream_mode_details: None,
    };
    match cache.create_stream(region, &request).await {
        Ok(_) => {}
        // A stream surviving in a restored snapshot is fine.
        Err(KinesisError::ResourceInUse(_)) => {
            info!(stream = %stream.name, "pre-init stream already exists");
            return;
        }
        Err(e) => {
            warn!(stream = %stream.name, error = %e, "pre-init create failed");
            return;
        }
    }

    // Poll until the stream leaves CREATING, bounded.
    let describe = DescribeStreamSummaryRequest {
        stream_name: Some(stream.name.clone()),
    };
    let delay_ms = cache.config().create_stream_duration_ms;
    for _attempt in 0..POLL_ATTEMPTS {
        let wake_at = cache.clock().now_ms() + delay_ms as i64;
        cache.clock().sleep_until(wake_at).await;
        match cache.describe_stream_summary(region, &describe).await {
            Ok(summary)
                if summary.stream_description_summary.stream_status != "CREATING" =>
            {
                info!(stream = %stream.name, "pre-init stream ready");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(stream = %stream.name, error = %e, "pre-init poll failed");
                return;
            }
        }
    }
    warn!(stream = %stream.name, "pre-init stream still CREATING after polling");
}
