//! Gateway metadata lookups

use crate::types::FileMetaResponse;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shard_cache::provider::{FileMeta, MetadataError, MetadataProvider};
use tracing::debug;

/// HTTP client for the storage network's metadata gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    client: Client,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub(crate) fn file_meta_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.base_url, urlencoding::encode(file_id))
    }
}

#[async_trait]
impl MetadataProvider for GatewayClient {
    async fn file_meta(&self, file_id: &str) -> Result<FileMeta, MetadataError> {
        let url = self.file_meta_url(file_id);
        debug!(file_id, url = %url, "fetching file metadata");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| MetadataError::Connection(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(MetadataError::NotFound);
        }
        if !response.status().is_success() {
            return Err(MetadataError::Connection(format!(
                "gateway returned status {}",
                response.status()
            )));
        }

        let body: FileMetaResponse = response
            .json()
            .await
            .map_err(|err| MetadataError::Connection(err.to_string()))?;
        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_meta_url_encodes_and_trims() {
        let client = GatewayClient::new("http://gateway:8000/");
        assert_eq!(
            client.file_meta_url("abc123"),
            "http://gateway:8000/files/abc123"
        );
        assert_eq!(
            client.file_meta_url("a/b"),
            "http://gateway:8000/files/a%2Fb"
        );
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_connection_error() {
        // nothing listens on port 1; connection is refused immediately
        let client = GatewayClient::new("http://127.0.0.1:1");
        match client.file_meta("f1").await {
            Err(MetadataError::Connection(_)) => {}
            other => panic!("expected connection error, got {:?}", other.map(|m| m.total_size)),
        }
    }
}
