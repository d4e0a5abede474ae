//! Gateway wire types

use serde::Deserialize;
use shard_cache::provider::{FileMeta, ShardMeta};

/// Metadata document served by the gateway for one file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileMetaResponse {
    pub total_size: u64,
    pub shards: Vec<ShardResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShardResponse {
    pub shard_id: String,
    pub size: u64,
    pub location: String,
}

impl From<FileMetaResponse> for FileMeta {
    fn from(response: FileMetaResponse) -> Self {
        FileMeta {
            total_size: response.total_size,
            shards: response
                .shards
                .into_iter()
                .map(|s| ShardMeta {
                    shard_id: s.shard_id,
                    size: s.size,
                    location: s.location,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_meta_response_deserialization() {
        let json = r#"{
            "total_size": 1536,
            "shards": [
                {"shard_id": "s1", "size": 1024, "location": "http://peer-a:9000"},
                {"shard_id": "s2", "size": 512, "location": "http://peer-b:9000"}
            ]
        }"#;
        let response: FileMetaResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.total_size, 1536);
        assert_eq!(response.shards.len(), 2);

        let meta: FileMeta = response.into();
        assert_eq!(meta.shard("s2").unwrap().location, "http://peer-b:9000");
    }
}
