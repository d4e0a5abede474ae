//! Fetch pipeline: bounded workers downloading admitted shards

use crate::engine::EngineInner;
use crate::types::CacheKey;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Dispatcher loop. Pulls admitted keys off the fetch queue and hands each
/// to a pooled worker task; a saturated pool delays dispatch, it never
/// drops queued work.
pub(crate) async fn run(inner: Arc<EngineInner>) {
    let pool = Arc::new(Semaphore::new(inner.config.fetch_workers));
    loop {
        let key = tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            key = inner.fetch_queue.recv() => match key {
                Some(key) => key,
                None => break,
            },
        };
        let permit = match pool.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let inner = inner.clone();
        tokio::spawn(async move {
            fetch_one(&inner, &key).await;
            // marker released on every exit path, success or failure
            inner.fetch_queue.release(&key);
            drop(permit);
        });
    }
}

async fn fetch_one(inner: &EngineInner, key: &CacheKey) {
    let dest_dir = inner.config.files_dir().join(key.file_id());
    if let Err(err) = tokio::fs::create_dir_all(&dest_dir).await {
        let failures = inner.failures.record(key);
        warn!(key = %key, failures, error = %err, "failed to prepare shard directory");
        return;
    }
    if let Err(err) = inner
        .fetcher
        .fetch(key.file_id(), key.shard_id(), &dest_dir)
        .await
    {
        let failures = inner.failures.record(key);
        warn!(key = %key, failures, error = %err, "shard fetch failed");
        return;
    }
    // commit what actually landed on disk, not what the peer claimed
    match tokio::fs::metadata(dest_dir.join(key.shard_id())).await {
        Ok(meta) if meta.len() > 0 => {
            inner.index.put(key.clone(), meta.len());
            inner.failures.clear(key);
            debug!(key = %key, size = meta.len(), "shard cached");
        }
        Ok(_) => {
            let failures = inner.failures.record(key);
            warn!(key = %key, failures, "fetched shard is empty");
        }
        Err(err) => {
            let failures = inner.failures.record(key);
            warn!(key = %key, failures, error = %err, "fetched shard missing on disk");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{failing_fetcher, mock_meta, test_inner, writing_fetcher};

    fn key(s: &str) -> CacheKey {
        CacheKey::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_successful_fetch_commits_entry_and_clears_failures() {
        let dir = tempfile::tempdir().unwrap();
        let inner = test_inner(dir.path(), mock_meta(&[]), writing_fetcher(128));
        inner.failures.record(&key("f1-s1"));

        fetch_one(&inner, &key("f1-s1")).await;

        assert_eq!(inner.index.lookup(&key("f1-s1")).unwrap().size, 128);
        assert_eq!(inner.index.total_size(), 128);
        assert_eq!(inner.failures.count(&key("f1-s1")), None);
    }

    #[tokio::test]
    async fn test_failed_fetch_records_failure_and_leaves_index_empty() {
        let dir = tempfile::tempdir().unwrap();
        let inner = test_inner(dir.path(), mock_meta(&[]), failing_fetcher());

        for _ in 0..3 {
            fetch_one(&inner, &key("f1-s1")).await;
        }

        assert_eq!(inner.failures.count(&key("f1-s1")), Some(3));
        assert!(inner.index.lookup(&key("f1-s1")).is_none());
        assert_eq!(inner.index.total_size(), 0);
    }

    #[tokio::test]
    async fn test_success_after_failures_resets_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let inner = test_inner(dir.path(), mock_meta(&[]), failing_fetcher());
        fetch_one(&inner, &key("f1-s1")).await;
        assert_eq!(inner.failures.count(&key("f1-s1")), Some(1));

        let inner = test_inner(dir.path(), mock_meta(&[]), writing_fetcher(64));
        inner.failures.record(&key("f1-s1"));
        fetch_one(&inner, &key("f1-s1")).await;
        assert_eq!(inner.failures.count(&key("f1-s1")), None);
        assert_eq!(inner.index.lookup(&key("f1-s1")).unwrap().size, 64);
    }
}
