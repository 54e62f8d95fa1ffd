//! Snapshot Codec
//!
//! The whole engine (every region's streams, shards, records, consumers,
//! plus the pending transition queue) serializes into one bincode file so a
//! restart resumes where the process left off. Persistence is best-effort:
//! the file is written with write-to-temp-then-rename so a crash mid-write
//! leaves the previous snapshot intact, and throttle state is deliberately
//! absent (buckets start full after a restore).
//!
//! The byte layout is an internal contract: it must stay stable within a
//! release, which is why the file opens with a version field that loading
//! checks before anything else.

use crate::scheduler::DelayedTransition;
use crate::store::RegionState;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encode/decode error: {0}")]
    Codec(String),

    #[error("snapshot version {0} is not supported")]
    UnsupportedVersion(u32),
}

/// The persisted form of the engine.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at_ms: i64,
    pub regions: Vec<RegionState>,
    pub pending: Vec<DelayedTransition>,
}

impl Snapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::Codec(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot =
            bincode::deserialize(bytes).map_err(|e| SnapshotError::Codec(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    /// Atomic replace: write a sibling temp file, fsync, rename over the
    /// target.
    pub async fn write_atomic(&self, path: &Path) -> Result<(), SnapshotError> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp: PathBuf = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        let file = tokio::fs::OpenOptions::new().read(true).open(&tmp).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await?;
        info!(path = %path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    /// Load a snapshot if the file exists; `Ok(None)` when it does not.
    pub async fn load_if_exists(path: &Path) -> Result<Option<Self>, SnapshotError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let snapshot = Self::from_bytes(&bytes)?;
                info!(
                    path = %path.display(),
                    regions = snapshot.regions.len(),
                    pending = snapshot.pending.len(),
                    "snapshot loaded"
                );
                Ok(Some(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "no snapshot file, starting fresh");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
