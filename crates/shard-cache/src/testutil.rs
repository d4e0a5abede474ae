//! Test doubles shared by the pipeline unit tests

use crate::engine::EngineInner;
use crate::provider::{
    FetchError, FileMeta, MetadataError, MetadataProvider, ShardFetcher, ShardMeta,
};
use crate::types::CacheConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub(crate) struct MockMetadata {
    files: HashMap<String, FileMeta>,
    connection_error: bool,
}

#[async_trait]
impl MetadataProvider for MockMetadata {
    async fn file_meta(&self, file_id: &str) -> Result<FileMeta, MetadataError> {
        if self.connection_error {
            return Err(MetadataError::Connection("mock gateway down".to_string()));
        }
        self.files
            .get(file_id)
            .cloned()
            .ok_or(MetadataError::NotFound)
    }
}

/// Metadata double serving the given `(file_id, [(shard_id, size)])` table.
pub(crate) fn mock_meta(files: &[(&str, &[(&str, u64)])]) -> Arc<MockMetadata> {
    let files = files
        .iter()
        .map(|(file_id, shards)| {
            let shards: Vec<ShardMeta> = shards
                .iter()
                .map(|(shard_id, size)| ShardMeta {
                    shard_id: shard_id.to_string(),
                    size: *size,
                    location: "http://mock-peer".to_string(),
                })
                .collect();
            let total_size = shards.iter().map(|s| s.size).sum();
            (file_id.to_string(), FileMeta { total_size, shards })
        })
        .collect();
    Arc::new(MockMetadata {
        files,
        connection_error: false,
    })
}

/// Metadata double failing every lookup with a connection error.
pub(crate) fn unreachable_meta() -> Arc<MockMetadata> {
    Arc::new(MockMetadata {
        files: HashMap::new(),
        connection_error: true,
    })
}

pub(crate) struct WritingFetcher {
    size: u64,
    calls: AtomicU32,
}

impl WritingFetcher {
    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShardFetcher for WritingFetcher {
    async fn fetch(
        &self,
        _file_id: &str,
        shard_id: &str,
        dest_dir: &Path,
    ) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(dest_dir.join(shard_id), vec![0u8; self.size as usize]).await?;
        Ok(())
    }
}

/// Fetch double that materializes `size` zero bytes per shard.
pub(crate) fn writing_fetcher(size: u64) -> Arc<WritingFetcher> {
    Arc::new(WritingFetcher {
        size,
        calls: AtomicU32::new(0),
    })
}

pub(crate) struct FailingFetcher {
    calls: AtomicU32,
}

impl FailingFetcher {
    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShardFetcher for FailingFetcher {
    async fn fetch(
        &self,
        _file_id: &str,
        _shard_id: &str,
        _dest_dir: &Path,
    ) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::Transfer("mock peer refused".to_string()))
    }
}

pub(crate) fn failing_fetcher() -> Arc<FailingFetcher> {
    Arc::new(FailingFetcher {
        calls: AtomicU32::new(0),
    })
}

/// Engine state rooted at `dir` with no background pipelines running.
pub(crate) fn test_inner(
    dir: &Path,
    metadata: Arc<dyn MetadataProvider>,
    fetcher: Arc<dyn ShardFetcher>,
) -> Arc<EngineInner> {
    test_inner_with_config(CacheConfig::new(dir, 1024 * 1024), metadata, fetcher)
}

pub(crate) fn test_inner_with_config(
    config: CacheConfig,
    metadata: Arc<dyn MetadataProvider>,
    fetcher: Arc<dyn ShardFetcher>,
) -> Arc<EngineInner> {
    std::fs::create_dir_all(config.files_dir()).unwrap();
    Arc::new(EngineInner::new(config, metadata, fetcher))
}
