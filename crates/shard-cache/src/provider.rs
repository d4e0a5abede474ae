//! Collaborator interfaces
//!
//! The engine trusts shard identity, size, and existence facts supplied by
//! the metadata collaborator, and delegates byte transfer to the fetch
//! collaborator. Both are trait objects so the HTTP gateway, and test
//! doubles, plug in at construction time.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;

/// Authoritative description of one shard of a file.
#[derive(Debug, Clone)]
pub struct ShardMeta {
    pub shard_id: String,
    pub size: u64,
    /// Peer endpoint holding the shard bytes.
    pub location: String,
}

/// Authoritative description of a file and its shards.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub total_size: u64,
    pub shards: Vec<ShardMeta>,
}

impl FileMeta {
    pub fn shard(&self, shard_id: &str) -> Option<&ShardMeta> {
        self.shards.iter().find(|s| s.shard_id == shard_id)
    }
}

#[derive(Debug)]
pub enum MetadataError {
    /// The file id is unknown to the network. Expected, not an error path.
    NotFound,
    /// Transient RPC failure; existing cache entries stay valid.
    Connection(String),
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::NotFound => write!(f, "file metadata not found"),
            MetadataError::Connection(msg) => write!(f, "metadata connection error: {}", msg),
        }
    }
}

impl std::error::Error for MetadataError {}

#[derive(Debug)]
pub enum FetchError {
    Transfer(String),
    Io(Box<std::io::Error>),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transfer(msg) => write!(f, "shard transfer error: {}", msg),
            FetchError::Io(err) => write!(f, "shard IO error: {}", err),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Io(Box::new(err))
    }
}

/// Source of canonical file/shard metadata.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn file_meta(&self, file_id: &str) -> Result<FileMeta, MetadataError>;
}

/// Streams one shard's bytes from a peer into `dest_dir/<shard_id>`.
#[async_trait]
pub trait ShardFetcher: Send + Sync {
    async fn fetch(
        &self,
        file_id: &str,
        shard_id: &str,
        dest_dir: &Path,
    ) -> Result<(), FetchError>;
}
