//! Clock Capability
//!
//! Every time-dependent part of the engine (the scheduler, throughput
//! buckets, iterator expiry, arrival timestamps) reads time through this
//! trait instead of the system clock, so tests drive transitions
//! deterministically with a [`ManualClock`] while production uses
//! [`SystemClock`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Milliseconds since the unix epoch.
    fn now_ms(&self) -> i64;

    /// Sleep until the clock reads at least `deadline_ms`. Returning early
    /// is allowed (callers re-check); sleeping past it is not bounded.
    async fn sleep_until(&self, deadline_ms: i64);
}

/// Wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    async fn sleep_until(&self, deadline_ms: i64) {
        let now = self.now_ms();
        if deadline_ms > now {
            tokio::time::sleep(Duration::from_millis((deadline_ms - now) as u64)).await;
        }
    }
}

/// A clock that only moves when told to. Sleepers watch the time through a
/// `watch` channel, so an advance can never slip between a sleeper's check
/// and its wait.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: watch::Sender<i64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Arc<Self> {
        Arc::new(Self {
            now_ms: watch::channel(start_ms).0,
        })
    }

    pub fn advance(&self, delta: Duration) {
        self.now_ms.send_modify(|now| *now += delta.as_millis() as i64);
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.send_modify(|now| *now = now_ms);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        *self.now_ms.borrow()
    }

    async fn sleep_until(&self, deadline_ms: i64) {
        let mut rx = self.now_ms.subscribe();
        // The sender lives in self, so this only errs if self is dropped
        // mid-sleep, in which case waking is the right answer anyway.
        let _ = rx.wait_for(|now| *now >= deadline_ms).await;
    }
}
