//! Deletion pipeline: removing evicted shard files from disk
//!
//! An orphaned file is unreclaimed capacity, so unlink failures re-enqueue
//! the same key indefinitely rather than dropping it.

use crate::engine::EngineInner;
use crate::types::CacheKey;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const RETRY_DELAY: Duration = Duration::from_secs(1);

pub(crate) async fn run(inner: Arc<EngineInner>) {
    let pool = Arc::new(Semaphore::new(inner.config.delete_workers));
    loop {
        let key = tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            key = inner.delete_queue.recv() => match key {
                Some(key) => key,
                None => break,
            },
        };
        // re-admitted while queued: the file is live again, keep it
        if inner.index.lookup(&key).is_some() {
            inner.delete_queue.release(&key);
            continue;
        }
        let permit = match pool.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let inner = inner.clone();
        tokio::spawn(async move {
            delete_one(&inner, key).await;
            drop(permit);
        });
    }
}

async fn delete_one(inner: &EngineInner, key: CacheKey) {
    let path = inner.shard_path(&key);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            inner.delete_queue.release(&key);
            debug!(key = %key, "shard file removed");
        }
        // already gone counts as success
        Err(err) if err.kind() == ErrorKind::NotFound => {
            inner.delete_queue.release(&key);
        }
        Err(err) => {
            warn!(key = %key, error = %err, "shard unlink failed, requeueing");
            tokio::select! {
                _ = inner.shutdown.cancelled() => {}
                _ = async {
                    tokio::time::sleep(RETRY_DELAY).await;
                    inner.delete_queue.requeue(key.clone()).await;
                } => {}
            }
        }
    }
}
