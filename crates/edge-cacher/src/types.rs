//! Service configuration and HTTP response types

use chrono::{DateTime, Utc};
use serde::Serialize;
use shard_cache::{CacheEntry, StatsSnapshot};
use std::path::PathBuf;

/// Edge cacher configuration, loaded from the environment in `main`.
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    pub port: u16,
    pub cache_dir: PathBuf,
    pub capacity: u64,
    pub gateway_url: String,
    pub high_water: Option<f64>,
    pub low_water: Option<f64>,
    pub freq_weight: Option<f64>,
    pub fetch_workers: Option<usize>,
    pub throughput_hint: Option<u64>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheSummary,
}

#[derive(Debug, Serialize)]
pub struct CacheSummary {
    pub entries: usize,
    pub total_size: u64,
    pub capacity: u64,
    pub stats: StatsSnapshot,
}

/// Body for a shard that is still being fetched.
#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub status: String,
    /// Consecutive fetch failures so far; lets clients stop polling a
    /// known-failing key.
    pub failures: u32,
}

/// Entry metadata exposed by the info endpoint.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub key: String,
    pub size: u64,
    pub loaded_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
}

impl EntryResponse {
    pub fn new(key: String, entry: CacheEntry) -> Self {
        Self {
            key,
            size: entry.size,
            loaded_at: entry.loaded_at,
            last_accessed_at: entry.last_accessed_at,
            access_count: entry.access_count,
        }
    }
}
