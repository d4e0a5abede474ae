//! RandomLRU eviction strategy
//!
//! Periodically samples a random subset of the index, scores entries by a
//! recency/frequency blend, and evicts the most stale until usage is back
//! under the low-water mark. Sampling trades exactness for bounded scan
//! cost; misclassifications self-correct on later ticks.

use crate::engine::EngineInner;
use crate::index::EntryIndex;
use crate::types::{CacheEntry, CacheKey};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Sample budget as a multiple of the eviction target.
const SAMPLE_FACTOR: u64 = 3;
/// Floor on the per-entry inclusion probability so small targets still
/// sample broadly.
const MIN_INCLUSION_PCT: u64 = 50;

pub(crate) async fn run(inner: Arc<EngineInner>) {
    let mut ticker = tokio::time::interval(inner.config.eviction_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        evict_once(&inner).await;
    }
}

/// One eviction pass: a no-op below the high-water mark, otherwise shrinks
/// the index to the low-water mark and queues victims for physical deletion.
pub(crate) async fn evict_once(inner: &EngineInner) {
    let used = inner.index.total_size();
    if used < inner.config.high_water_bytes() {
        return;
    }
    let target = used.saturating_sub(inner.config.low_water_bytes());
    if target == 0 {
        return;
    }
    let victims = select_victims(&inner.index, target, inner.config.freq_weight);
    if victims.is_empty() {
        return;
    }
    info!(used, target, victims = victims.len(), "eviction pass");
    for key in victims {
        inner.index.remove(&key);
        inner.delete_queue.admit(key).await;
    }
}

/// Higher score = more evictable: stale, rarely used, or both.
fn score(entry: &CacheEntry, now: DateTime<Utc>, freq_weight: f64) -> f64 {
    let gap = (now - entry.last_accessed_at).num_milliseconds().max(0) as f64;
    let count = entry.access_count.max(1) as f64;
    (1.0 - freq_weight) * gap + freq_weight * gap / count
}

fn select_victims(index: &EntryIndex, target: u64, freq_weight: f64) -> Vec<CacheKey> {
    let total = index.total_size();
    if total == 0 {
        return Vec::new();
    }
    let budget = target.saturating_mul(SAMPLE_FACTOR).min(total);
    let sample = sample_entries(index, budget, total);

    let now = Utc::now();
    let mut scored: Vec<(f64, u64, CacheKey)> = sample
        .into_iter()
        .map(|(key, entry)| (score(&entry, now, freq_weight), entry.size, key))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let mut victims = Vec::new();
    let mut freed = 0u64;
    for (_, size, key) in scored {
        if freed >= target {
            break;
        }
        freed += size;
        victims.push(key);
    }
    victims
}

/// Reservoir-style sample: random passes over the index with an inclusion
/// probability derived from the budget, until the sampled sizes cover the
/// budget or the index is exhausted. A budget at or above the total skips
/// the lottery entirely.
fn sample_entries(index: &EntryIndex, budget: u64, total: u64) -> Vec<(CacheKey, CacheEntry)> {
    index.with_entries(|entries| {
        if budget >= total {
            return entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
        }
        let pct = (budget * 100 / total).max(MIN_INCLUSION_PCT);
        let mut rng = rand::thread_rng();
        let mut seen: HashSet<CacheKey> = HashSet::new();
        let mut picked = Vec::new();
        let mut sampled = 0u64;
        while sampled < budget && seen.len() < entries.len() {
            for (key, entry) in entries {
                if sampled >= budget {
                    break;
                }
                if seen.contains(key) {
                    continue;
                }
                if rng.gen_range(0..100) < pct {
                    seen.insert(key.clone());
                    sampled += entry.size;
                    picked.push((key.clone(), entry.clone()));
                }
            }
        }
        picked
    })
}
