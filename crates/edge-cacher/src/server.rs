//! HTTP server exposing the cache engine
//!
//! Provides /health, /stats, /shards, /shards/{file}/{shard}, and
//! /shards/{file}/{shard}/info endpoints.

use crate::types::{CacheSummary, EntryResponse, HealthResponse, PendingResponse};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shard_cache::{CacheEngine, CacheKey, Decision, StatsSnapshot};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Shared state for the HTTP server
pub struct ServerState {
    pub engine: CacheEngine,
    pub capacity: u64,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(engine: CacheEngine, capacity: u64) -> Self {
        Self {
            engine,
            capacity,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/shards", get(list_shards))
        .route("/shards/{file_id}/{shard_id}", get(get_shard))
        .route("/shards/{file_id}/{shard_id}/info", get(shard_info))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: CacheSummary {
            entries: state.engine.entry_count(),
            total_size: state.engine.total_size(),
            capacity: state.capacity,
            stats: state.engine.stats(),
        },
    })
}

/// Lifetime hit/miss/error rates
async fn stats(State(state): State<SharedState>) -> Json<StatsSnapshot> {
    Json(state.engine.stats())
}

/// All cached shard keys in canonical form
async fn list_shards(State(state): State<SharedState>) -> Json<Vec<String>> {
    let mut keys: Vec<String> = state.engine.list().iter().map(|k| k.to_string()).collect();
    keys.sort();
    Json(keys)
}

/// Serve a shard's bytes on hit; answer 202 while a fetch is in flight.
async fn get_shard(
    State(state): State<SharedState>,
    Path((file_id, shard_id)): Path<(String, String)>,
) -> Response {
    let key = CacheKey::new(file_id, shard_id);
    match state.engine.decide(&key).await {
        Ok(Decision::Hit) => match tokio::fs::read(state.engine.shard_path(&key)).await {
            Ok(data) => Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .header("X-Cache", "HIT")
                .body(Body::from(data))
                .unwrap(),
            Err(e) => {
                error!(key = %key, error = %e, "indexed shard unreadable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Shard unreadable".to_string(),
                    }),
                )
                    .into_response()
            }
        },
        Ok(Decision::Pending) => (
            StatusCode::ACCEPTED,
            Json(PendingResponse {
                status: "pending".to_string(),
                failures: state.engine.failure_count(&key).unwrap_or(0),
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(key = %key, error = %e, "admission check failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "Metadata unavailable".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Entry metadata for a cached shard
async fn shard_info(
    State(state): State<SharedState>,
    Path((file_id, shard_id)): Path<(String, String)>,
) -> Response {
    let key = CacheKey::new(file_id, shard_id);
    match state.engine.lookup(&key) {
        Some(entry) => Json(EntryResponse::new(key.to_string(), entry)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Shard not cached".to_string(),
            }),
        )
            .into_response(),
    }
}
