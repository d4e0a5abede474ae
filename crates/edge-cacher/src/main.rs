//! Edge Cacher - Caching edge node for the storage network
//!
//! Keeps hot shards on local disk, fetches misses from peer storage
//! nodes, and serves them over HTTP.

mod error;
mod server;
mod types;

use crate::error::{EdgeError, Result};
use crate::server::{start_server, ServerState, SharedState};
use crate::types::EdgeConfig;
use shard_cache::{CacheConfig, CacheEngine};
use std::path::PathBuf;
use std::sync::Arc;
use storage_gateway::{GatewayClient, HttpShardFetcher};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("edge_cacher=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Edge Cacher...");

    // Load configuration from environment
    let config = load_config()?;
    info!("Port: {}", config.port);
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Capacity: {} MB", config.capacity / (1024 * 1024));
    info!("Gateway: {}", config.gateway_url);

    let mut cache_config = CacheConfig::new(&config.cache_dir, config.capacity);
    if let Some(high_water) = config.high_water {
        cache_config.high_water = high_water;
    }
    if let Some(low_water) = config.low_water {
        cache_config.low_water = low_water;
    }
    if let Some(freq_weight) = config.freq_weight {
        cache_config.freq_weight = freq_weight;
    }
    if let Some(fetch_workers) = config.fetch_workers {
        cache_config.fetch_workers = fetch_workers;
    }
    cache_config.throughput_hint = config.throughput_hint;

    // Gateway metadata client doubles as the fetcher's shard locator
    let gateway = GatewayClient::new(&config.gateway_url);
    let fetcher = HttpShardFetcher::new(gateway.clone());

    let capacity = cache_config.capacity;
    let engine = CacheEngine::start(cache_config, Arc::new(gateway), Arc::new(fetcher)).await?;

    // Create shared state
    let state: SharedState = Arc::new(ServerState::new(engine, capacity));

    // Start HTTP server (blocking)
    start_server(state, config.port)
        .await
        .map_err(|e| EdgeError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

fn load_config() -> Result<EdgeConfig> {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3002);

    let cache_dir = std::env::var("CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./cache"));

    let capacity = std::env::var("CAPACITY_BYTES")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(1024 * 1024 * 1024); // 1GB default

    let gateway_url = std::env::var("GATEWAY_URL")
        .unwrap_or_else(|_| "http://localhost:8000".to_string());

    let high_water = parse_optional::<f64>("HIGH_WATER")?;
    let low_water = parse_optional::<f64>("LOW_WATER")?;
    let freq_weight = parse_optional::<f64>("FREQ_WEIGHT")?;
    let fetch_workers = parse_optional::<usize>("FETCH_WORKERS")?;
    let throughput_hint = parse_optional::<u64>("THROUGHPUT_BYTES_PER_SEC")?;

    Ok(EdgeConfig {
        port,
        cache_dir,
        capacity,
        gateway_url,
        high_water,
        low_water,
        freq_weight,
        fetch_workers,
        throughput_hint,
    })
}

/// Parses an optional env var, failing loudly on a malformed value
/// instead of silently falling back to the default.
fn parse_optional<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| EdgeError::Config(format!("{} has invalid value {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}
