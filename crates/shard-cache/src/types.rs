//! Core cache types

use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Content-addressed identifier for a single shard.
///
/// Canonical form is `"<fileId>-<shardId>"`; neither component contains `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    file_id: String,
    shard_id: String,
}

impl CacheKey {
    pub fn new(file_id: impl Into<String>, shard_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            shard_id: shard_id.into(),
        }
    }

    /// Parse a key from its canonical `"<fileId>-<shardId>"` form.
    pub fn parse(s: &str) -> Option<Self> {
        let (file_id, shard_id) = s.split_once('-')?;
        if file_id.is_empty() || shard_id.is_empty() {
            return None;
        }
        Some(Self::new(file_id, shard_id))
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.file_id, self.shard_id)
    }
}

/// Metadata for a cached shard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub size: u64,
    pub loaded_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
}

impl CacheEntry {
    /// A freshly committed entry counts its commit as the first access.
    pub fn new(size: u64) -> Self {
        let now = Utc::now();
        Self {
            size,
            loaded_at: now,
            last_accessed_at: now,
            access_count: 1,
        }
    }
}

/// Admission verdict for a requested shard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The shard is on disk and indexed; serve it.
    Hit,
    /// A fetch is queued or in flight; poll again later.
    Pending,
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory; shard files live under `<root>/files`, the index
    /// snapshot at `<root>/metadata.json`.
    pub cache_dir: PathBuf,
    /// Total byte budget for cached shards.
    pub capacity: u64,
    /// Fraction of capacity at which eviction starts.
    pub high_water: f64,
    /// Fraction of capacity eviction shrinks the index back to.
    pub low_water: f64,
    /// Frequency weight in the eviction score; the remainder weights recency.
    pub freq_weight: f64,
    pub fetch_workers: usize,
    pub delete_workers: usize,
    /// Depth of the fetch and deletion handoff queues.
    pub queue_depth: usize,
    /// Index snapshot flush period.
    pub flush_interval: Duration,
    /// Upper bound on the eviction tick period.
    pub max_evict_interval: Duration,
    /// Period of the wholesale failure-record purge.
    pub failure_purge_interval: Duration,
    /// Downstream throughput hint in bytes/sec; when set, the eviction tick
    /// is derived from it instead of running at the maximum period.
    pub throughput_hint: Option<u64>,
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>, capacity: u64) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            capacity,
            high_water: 0.95,
            low_water: 0.80,
            freq_weight: 0.3,
            fetch_workers: 8,
            delete_workers: 4,
            queue_depth: 512,
            flush_interval: Duration::from_secs(60),
            max_evict_interval: Duration::from_secs(60),
            failure_purge_interval: Duration::from_secs(30 * 60),
            throughput_hint: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::Config("capacity must be non-zero".to_string()));
        }
        for (name, value) in [
            ("high_water", self.high_water),
            ("low_water", self.low_water),
            ("freq_weight", self.freq_weight),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(CacheError::Config(format!(
                    "{} must lie in (0, 1), got {}",
                    name, value
                )));
            }
        }
        if self.low_water >= self.high_water {
            return Err(CacheError::Config(format!(
                "low_water {} must be below high_water {}",
                self.low_water, self.high_water
            )));
        }
        if self.fetch_workers == 0 || self.delete_workers == 0 {
            return Err(CacheError::Config(
                "worker pools must have at least one slot".to_string(),
            ));
        }
        if self.queue_depth == 0 {
            return Err(CacheError::Config("queue_depth must be non-zero".to_string()));
        }
        Ok(())
    }

    pub(crate) fn files_dir(&self) -> PathBuf {
        self.cache_dir.join("files")
    }

    pub(crate) fn snapshot_path(&self) -> PathBuf {
        self.cache_dir.join("metadata.json")
    }

    pub(crate) fn high_water_bytes(&self) -> u64 {
        (self.capacity as f64 * self.high_water) as u64
    }

    pub(crate) fn low_water_bytes(&self) -> u64 {
        (self.capacity as f64 * self.low_water) as u64
    }

    /// Eviction tick period: time to download 3% of capacity at the hinted
    /// throughput, capped at `max_evict_interval`.
    pub(crate) fn eviction_interval(&self) -> Duration {
        let max = self.max_evict_interval;
        match self.throughput_hint {
            Some(bps) if bps > 0 => {
                let secs = self.capacity * 3 / 100 / bps;
                if secs == 0 || secs >= max.as_secs() {
                    max
                } else {
                    Duration::from_secs(secs)
                }
            }
            _ => max,
        }
    }
}
