//! Cache and eviction engine for a storage-network edge node
//!
//! Owns the mapping from content-addressed shard keys to on-disk files,
//! deduplicates fetch-on-miss downloads, and keeps disk usage inside
//! configured watermarks with a sampled frequency/recency eviction policy.

mod delete;
mod engine;
mod error;
mod evict;
mod failure;
mod fetch;
mod index;
mod pending;
mod persist;
mod reconcile;
mod stats;
mod types;

pub mod provider;

#[cfg(test)]
pub(crate) mod testutil;

pub use engine::CacheEngine;
pub use error::{CacheError, Result};
pub use stats::StatsSnapshot;
pub use types::{CacheConfig, CacheEntry, CacheKey, Decision};
