//! Lifetime hit/miss/error accounting

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic lifetime counters, shared across pipelines.
#[derive(Debug, Default)]
pub(crate) struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

/// Derived rates over the lifetime counters; all zero until the first event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub err_rate: f64,
}

impl CacheStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn counts(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
        )
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        let (hits, misses, errors) = self.counts();
        let total = (hits + misses + errors) as f64;
        if total == 0.0 {
            return StatsSnapshot::default();
        }
        StatsSnapshot {
            hit_rate: hits as f64 / total,
            miss_rate: misses as f64 / total,
            err_rate: errors as f64 / total,
        }
    }
}
