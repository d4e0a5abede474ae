//! Per-key consecutive fetch failure accounting

use crate::engine::EngineInner;
use crate::types::CacheKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Consecutive-failure counters, cleared per key on success and purged
/// wholesale on a long timer so a historically failing key becomes
/// retryable again.
#[derive(Default)]
pub(crate) struct FailureMap {
    counts: Mutex<HashMap<CacheKey, u32>>,
}

impl FailureMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record one more failure, returning the new consecutive count.
    pub(crate) fn record(&self, key: &CacheKey) -> u32 {
        let mut counts = self.counts.lock();
        let count = counts.entry(key.clone()).or_insert(0);
        *count += 1;
        *count
    }

    pub(crate) fn clear(&self, key: &CacheKey) {
        self.counts.lock().remove(key);
    }

    pub(crate) fn count(&self, key: &CacheKey) -> Option<u32> {
        self.counts.lock().get(key).copied()
    }

    pub(crate) fn purge(&self) -> usize {
        let mut counts = self.counts.lock();
        let purged = counts.len();
        counts.clear();
        purged
    }
}

/// Wholesale purge loop; runs until shutdown.
pub(crate) async fn run_purge(inner: Arc<EngineInner>) {
    let mut ticker = tokio::time::interval(inner.config.failure_purge_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // immediate first tick would purge nothing anyway
    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let purged = inner.failures.purge();
        if purged > 0 {
            debug!(purged, "purged failure records");
        }
    }
}
