//! Storage Network Gateway Clients
//!
//! HTTP implementations of the cache engine's collaborator traits:
//! canonical file/shard metadata from a network gateway, and streamed
//! shard downloads from the peers it names.

pub mod fetcher;
pub mod gateway;
pub mod types;

pub use fetcher::HttpShardFetcher;
pub use gateway::GatewayClient;
pub use types::{FileMetaResponse, ShardResponse};
