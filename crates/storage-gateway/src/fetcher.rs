//! Streamed shard downloads from peer nodes

use crate::gateway::GatewayClient;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use shard_cache::provider::{FetchError, MetadataProvider, ShardFetcher};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Downloads shard bytes over HTTP from the peer named by gateway metadata.
///
/// Bytes land in a `.part` file that is renamed into place only on a
/// complete transfer, so the engine never commits a torn download.
pub struct HttpShardFetcher {
    gateway: GatewayClient,
    client: Client,
}

impl HttpShardFetcher {
    pub fn new(gateway: GatewayClient) -> Self {
        Self {
            gateway,
            client: Client::new(),
        }
    }

    pub(crate) fn shard_url(location: &str, file_id: &str, shard_id: &str) -> String {
        format!(
            "{}/shards/{}/{}",
            location.trim_end_matches('/'),
            urlencoding::encode(file_id),
            urlencoding::encode(shard_id)
        )
    }
}

#[async_trait]
impl ShardFetcher for HttpShardFetcher {
    async fn fetch(
        &self,
        file_id: &str,
        shard_id: &str,
        dest_dir: &Path,
    ) -> Result<(), FetchError> {
        let meta = self
            .gateway
            .file_meta(file_id)
            .await
            .map_err(|err| FetchError::Transfer(err.to_string()))?;
        let shard = meta.shard(shard_id).ok_or_else(|| {
            FetchError::Transfer(format!("shard {} not in authoritative set", shard_id))
        })?;

        let dest = dest_dir.join(shard_id);
        match tokio::fs::metadata(&dest).await {
            // a complete file from an earlier attempt; nothing to do
            Ok(existing) if existing.len() == shard.size => {
                debug!(file_id, shard_id, "shard already complete on disk");
                return Ok(());
            }
            Ok(_) => {
                warn!(file_id, shard_id, "discarding partial shard file");
                tokio::fs::remove_file(&dest).await?;
            }
            Err(_) => {}
        }

        let url = Self::shard_url(&shard.location, file_id, shard_id);
        debug!(url = %url, "downloading shard");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| FetchError::Transfer(err.to_string()))?;
        if !response.status().is_success() {
            return Err(FetchError::Transfer(format!(
                "peer returned status {}",
                response.status()
            )));
        }

        let part = dest_dir.join(format!("{}.part", shard_id));
        let mut file = tokio::fs::File::create(&part).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| FetchError::Transfer(err.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if written != shard.size {
            tokio::fs::remove_file(&part).await?;
            return Err(FetchError::Transfer(format!(
                "peer sent {} bytes, authoritative size is {}",
                written, shard.size
            )));
        }
        tokio::fs::rename(&part, &dest).await?;
        debug!(file_id, shard_id, size = written, "shard downloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_url_joins_and_encodes() {
        assert_eq!(
            HttpShardFetcher::shard_url("http://peer:9000/", "f1", "s1"),
            "http://peer:9000/shards/f1/s1"
        );
        assert_eq!(
            HttpShardFetcher::shard_url("http://peer:9000", "f/1", "s 1"),
            "http://peer:9000/shards/f%2F1/s%201"
        );
    }
}
