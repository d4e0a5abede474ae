//! Index snapshot persistence
//!
//! Best-effort periodic flush of the full index to a side file, replaced
//! atomically. A crash between flushes loses only access/recency metadata;
//! reconciliation rebuilds correctness from disk.

use crate::engine::EngineInner;
use crate::error::{CacheError, Result};
use crate::index::EntryIndex;
use crate::types::CacheEntry;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Load the snapshot into the index.
///
/// A missing file is the documented start-empty mode and seeds an empty
/// snapshot; an unparseable file is fatal — silently discarding a snapshot
/// would hide real corruption.
pub(crate) async fn load(path: &Path, index: &EntryIndex) -> Result<()> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let snapshot: HashMap<String, CacheEntry> =
                serde_json::from_slice(&bytes).map_err(|err| {
                    CacheError::Persistence(format!(
                        "unreadable snapshot {}: {}",
                        path.display(),
                        err
                    ))
                })?;
            let loaded = index.import(snapshot);
            info!(entries = loaded, "loaded index snapshot");
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tokio::fs::write(path, b"{}").await?;
            info!("no index snapshot, starting empty");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Serialize the index and atomically replace the snapshot file.
pub(crate) async fn flush(path: &Path, index: &EntryIndex) -> Result<()> {
    let snapshot = index.export();
    let bytes = serde_json::to_vec(&snapshot)
        .map_err(|err| CacheError::Persistence(err.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(entries = snapshot.len(), "flushed index snapshot");
    Ok(())
}

/// Interval flush loop; a failed flush is logged, never fatal. One final
/// flush runs at shutdown.
pub(crate) async fn run(inner: Arc<EngineInner>) {
    let path = inner.config.snapshot_path();
    let mut ticker = tokio::time::interval(inner.config.flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // the load just happened; skip the immediate tick
    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if let Err(err) = flush(&path, &inner.index).await {
            error!(error = %err, "index snapshot flush failed");
        }
    }
    if let Err(err) = flush(&path, &inner.index).await {
        error!(error = %err, "final index snapshot flush failed");
    }
}
