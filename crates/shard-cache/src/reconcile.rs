//! Startup reconciliation against on-disk ground truth
//!
//! The snapshot is an optimization; disk plus authoritative metadata is the
//! truth. Runs once before the engine serves traffic: stale index entries
//! are dropped, unindexed files are either validated into the index or
//! removed. The cache never serves unverifiable data.

use crate::engine::EngineInner;
use crate::error::Result;
use crate::provider::MetadataError;
use crate::types::CacheKey;
use tracing::{debug, info, warn};

enum Validation {
    Valid(u64),
    Invalid(&'static str),
    /// Metadata collaborator unreachable; neither index nor delete.
    Unknown,
}

pub(crate) async fn run(inner: &EngineInner) -> Result<()> {
    // entries restored from the snapshot may point at files a crash or an
    // operator removed
    for key in inner.index.list() {
        if tokio::fs::metadata(inner.shard_path(&key)).await.is_err() {
            inner.index.remove(&key);
            warn!(key = %key, "dropped index entry with no backing file");
        }
    }

    let files_dir = inner.config.files_dir();
    let mut dirs = tokio::fs::read_dir(&files_dir).await?;
    while let Some(dir) = dirs.next_entry().await? {
        if !dir.file_type().await?.is_dir() {
            continue;
        }
        let file_id = dir.file_name().to_string_lossy().into_owned();
        let mut shards = tokio::fs::read_dir(dir.path()).await?;
        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_file() {
                continue;
            }
            let shard_id = shard.file_name().to_string_lossy().into_owned();
            let key = CacheKey::new(&file_id, &shard_id);
            if inner.index.lookup(&key).is_some() {
                continue;
            }
            let on_disk = shard.metadata().await?.len();
            match validate(inner, &key, on_disk).await {
                Validation::Valid(size) => {
                    inner.index.put(key.clone(), size);
                    debug!(key = %key, size, "adopted on-disk shard");
                }
                Validation::Invalid(reason) => {
                    warn!(key = %key, reason, "removing unverifiable shard");
                    if let Err(err) = tokio::fs::remove_file(shard.path()).await {
                        warn!(key = %key, error = %err, "failed to remove unverifiable shard");
                    }
                }
                Validation::Unknown => {
                    debug!(key = %key, "metadata unavailable, leaving shard unindexed");
                }
            }
        }
    }

    info!(
        entries = inner.index.len(),
        total_size = inner.index.total_size(),
        "reconciliation complete"
    );
    Ok(())
}

async fn validate(inner: &EngineInner, key: &CacheKey, on_disk: u64) -> Validation {
    let meta = match inner.metadata.file_meta(key.file_id()).await {
        Ok(meta) => meta,
        Err(MetadataError::NotFound) => return Validation::Invalid("no authoritative metadata"),
        Err(MetadataError::Connection(err)) => {
            warn!(key = %key, error = %err, "metadata lookup failed during reconciliation");
            return Validation::Unknown;
        }
    };
    match meta.shard(key.shard_id()) {
        None => Validation::Invalid("shard not in authoritative set"),
        Some(shard) if shard.size != on_disk => Validation::Invalid("size mismatch"),
        Some(shard) => Validation::Valid(shard.size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{failing_fetcher, mock_meta, test_inner, unreachable_meta};

    fn key(s: &str) -> CacheKey {
        CacheKey::parse(s).unwrap()
    }

    async fn write_shard(inner: &EngineInner, key: &CacheKey, size: usize) {
        let path = inner.shard_path(key);
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&path, vec![1u8; size]).await.unwrap();
    }

    #[tokio::test]
    async fn test_valid_file_indexed_invalid_file_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let meta = mock_meta(&[("f1", &[("s1", 10), ("s2", 99)])]);
        let inner = test_inner(dir.path(), meta, failing_fetcher());
        write_shard(&inner, &key("f1-s1"), 10).await;
        write_shard(&inner, &key("f1-s2"), 10).await; // authoritative size is 99

        run(&inner).await.unwrap();

        assert_eq!(inner.index.len(), 1);
        assert_eq!(inner.index.lookup(&key("f1-s1")).unwrap().size, 10);
        assert_eq!(inner.index.lookup(&key("f1-s1")).unwrap().access_count, 1);
        assert!(tokio::fs::metadata(inner.shard_path(&key("f1-s2")))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unknown_file_and_unknown_shard_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let meta = mock_meta(&[("f1", &[("s1", 10)])]);
        let inner = test_inner(dir.path(), meta, failing_fetcher());
        write_shard(&inner, &key("f1-s9"), 10).await; // shard not in set
        write_shard(&inner, &key("f9-s1"), 10).await; // file unknown

        run(&inner).await.unwrap();

        assert_eq!(inner.index.len(), 0);
        assert!(tokio::fs::metadata(inner.shard_path(&key("f1-s9")))
            .await
            .is_err());
        assert!(tokio::fs::metadata(inner.shard_path(&key("f9-s1")))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_metadata_outage_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let inner = test_inner(dir.path(), unreachable_meta(), failing_fetcher());
        write_shard(&inner, &key("f1-s1"), 10).await;

        run(&inner).await.unwrap();

        // local file is not evidence of anything either way during an outage
        assert_eq!(inner.index.len(), 0);
        assert!(tokio::fs::metadata(inner.shard_path(&key("f1-s1")))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_stale_index_entries_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let meta = mock_meta(&[("f1", &[("s1", 10)])]);
        let inner = test_inner(dir.path(), meta, failing_fetcher());
        inner.index.put(key("f1-s1"), 10);
        inner.index.put(key("f2-s1"), 20); // nothing on disk for either

        run(&inner).await.unwrap();

        assert_eq!(inner.index.len(), 0);
        assert_eq!(inner.index.total_size(), 0);
    }
}
