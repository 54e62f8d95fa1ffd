//! Periodic Persistence Loop
//!
//! When persistence is enabled, a background task snapshots the whole engine
//! on an interval and once more on shutdown. Snapshots are best-effort: a
//! failed write is logged and the loop keeps going; the previous file stays
//! intact thanks to the atomic replace in the snapshot codec.

use crate::config::PersistConfig;
use kinesis_mock_engine::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub fn spawn_persistence_loop(
    cache: Arc<Cache>,
    config: PersistConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(config.interval_ms.max(1)));
        // The first tick fires immediately; skip it so boot isn't spent
        // writing an empty snapshot.
        ticker.tick().await;
        info!(
            path = %config.path.display(),
            interval_ms = config.interval_ms,
            "persistence loop started"
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    persist_once(&cache, &config).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        // Final snapshot on the way out.
        persist_once(&cache, &config).await;
        info!("persistence loop stopped");
    })
}

pub async fn persist_once(cache: &Cache, config: &PersistConfig) {
    let snapshot = cache.snapshot().await;
    if let Err(e) = snapshot.write_atomic(&config.path).await {
        error!(path = %config.path.display(), error = %e, "snapshot write failed");
    }
}
