//! Engine construction and the synchronous admission surface

use crate::error::{CacheError, Result};
use crate::failure::FailureMap;
use crate::index::EntryIndex;
use crate::pending::WorkQueue;
use crate::provider::{MetadataProvider, MetadataError, ShardFetcher};
use crate::stats::{CacheStats, StatsSnapshot};
use crate::types::{CacheConfig, CacheEntry, CacheKey, Decision};
use crate::{delete, evict, failure, fetch, persist, reconcile};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shared state behind the engine handle; every pipeline holds an `Arc` to it.
pub(crate) struct EngineInner {
    pub(crate) config: CacheConfig,
    pub(crate) index: EntryIndex,
    pub(crate) stats: CacheStats,
    pub(crate) failures: FailureMap,
    pub(crate) fetch_queue: WorkQueue,
    pub(crate) delete_queue: WorkQueue,
    pub(crate) metadata: Arc<dyn MetadataProvider>,
    pub(crate) fetcher: Arc<dyn ShardFetcher>,
    pub(crate) shutdown: CancellationToken,
}

impl EngineInner {
    pub(crate) fn new(
        config: CacheConfig,
        metadata: Arc<dyn MetadataProvider>,
        fetcher: Arc<dyn ShardFetcher>,
    ) -> Self {
        let queue_depth = config.queue_depth;
        Self {
            config,
            index: EntryIndex::new(),
            stats: CacheStats::new(),
            failures: FailureMap::new(),
            fetch_queue: WorkQueue::new(queue_depth),
            delete_queue: WorkQueue::new(queue_depth),
            metadata,
            fetcher,
            shutdown: CancellationToken::new(),
        }
    }

    pub(crate) fn shard_path(&self, key: &CacheKey) -> PathBuf {
        self.config.files_dir().join(key.file_id()).join(key.shard_id())
    }
}

/// Handle to the cache and eviction engine.
///
/// Constructed once at startup and passed by reference to the HTTP layer;
/// all shared state lives behind it, none of it is global.
#[derive(Clone)]
pub struct CacheEngine {
    inner: Arc<EngineInner>,
}

impl CacheEngine {
    /// Build the engine and bring it to serving state: create directories,
    /// load the index snapshot, reconcile against on-disk ground truth, then
    /// spawn the background pipelines. Errors here are fatal to startup.
    pub async fn start(
        config: CacheConfig,
        metadata: Arc<dyn MetadataProvider>,
        fetcher: Arc<dyn ShardFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(config.files_dir()).await?;

        let inner = Arc::new(EngineInner::new(config, metadata, fetcher));
        persist::load(&inner.config.snapshot_path(), &inner.index).await?;
        reconcile::run(&inner).await?;

        tokio::spawn(fetch::run(inner.clone()));
        tokio::spawn(delete::run(inner.clone()));
        tokio::spawn(evict::run(inner.clone()));
        tokio::spawn(persist::run(inner.clone()));
        tokio::spawn(failure::run_purge(inner.clone()));

        info!(
            entries = inner.index.len(),
            total_size = inner.index.total_size(),
            capacity = inner.config.capacity,
            "cache engine started"
        );
        Ok(Self { inner })
    }

    /// Admission check for a requested shard.
    ///
    /// Never blocks on an in-flight fetch: a miss enqueues work and returns
    /// [`Decision::Pending`] immediately. A metadata connection failure in
    /// the verify branch is the only error surfaced to callers.
    pub async fn decide(&self, key: &CacheKey) -> Result<Decision> {
        let inner = &self.inner;
        if inner.index.touch(key) {
            inner.stats.hit();
            return Ok(Decision::Hit);
        }
        // Already queued or downloading; repeated polls must not inflate
        // miss stats or duplicate fetch work.
        if inner.fetch_queue.contains(key) {
            return Ok(Decision::Pending);
        }
        match verify_existing(inner, key).await {
            Ok(Some(size)) => {
                // complete file left over from a prior run; index it
                // without re-fetching
                inner.index.put(key.clone(), size);
                inner.stats.hit();
                debug!(key = %key, size, "self-healed unindexed shard");
                Ok(Decision::Hit)
            }
            Ok(None) => {
                if inner.fetch_queue.admit(key.clone()).await {
                    inner.stats.miss();
                    debug!(key = %key, "shard fetch enqueued");
                }
                Ok(Decision::Pending)
            }
            Err(err) => {
                inner.stats.error();
                Err(err)
            }
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner.index.lookup(key)
    }

    pub fn list(&self) -> Vec<CacheKey> {
        self.inner.index.list()
    }

    pub fn find_present(&self, keys: &[CacheKey]) -> Vec<CacheKey> {
        self.inner.index.find_present(keys)
    }

    pub fn total_size(&self) -> u64 {
        self.inner.index.total_size()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.index.len()
    }

    pub fn cache_root(&self) -> &Path {
        &self.inner.config.cache_dir
    }

    /// On-disk location of a shard's bytes.
    pub fn shard_path(&self, key: &CacheKey) -> PathBuf {
        self.inner.shard_path(key)
    }

    /// Consecutive fetch failures for a key, if any are recorded. Lets the
    /// HTTP layer short-circuit polling of a known-failing key.
    pub fn failure_count(&self, key: &CacheKey) -> Option<u32> {
        self.inner.failures.count(key)
    }

    /// Stop all background pipelines. In-flight work finishes; nothing new
    /// is dispatched.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }
}

/// Check whether an unindexed on-disk file is already complete and correct
/// per authoritative metadata. `Ok(Some(size))` means it can be adopted
/// as-is; `Ok(None)` means a fetch is needed (including metadata
/// `NotFound`, which is not an error).
async fn verify_existing(inner: &EngineInner, key: &CacheKey) -> Result<Option<u64>> {
    let path = inner.shard_path(key);
    let on_disk = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => return Ok(None),
    };
    let meta = match inner.metadata.file_meta(key.file_id()).await {
        Ok(meta) => meta,
        Err(MetadataError::NotFound) => return Ok(None),
        Err(MetadataError::Connection(msg)) => {
            return Err(CacheError::MetadataUnavailable(msg))
        }
    };
    Ok(meta
        .shard(key.shard_id())
        .filter(|shard| shard.size == on_disk)
        .map(|shard| shard.size))
}
