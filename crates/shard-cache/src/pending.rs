//! In-flight work deduplication
//!
//! A `WorkQueue` pairs a dedup filter with a bounded handoff queue. The
//! filter is the correctness mechanism (at most one in-flight job per key);
//! the queue is only scheduling. A key's marker stays set until the owning
//! pipeline releases it on terminal success or failure.

use crate::types::CacheKey;
use parking_lot::Mutex;
use std::collections::HashSet;
use tokio::sync::mpsc;

pub(crate) struct WorkQueue {
    filter: Mutex<HashSet<CacheKey>>,
    tx: mpsc::Sender<CacheKey>,
    rx: tokio::sync::Mutex<mpsc::Receiver<CacheKey>>,
}

impl WorkQueue {
    pub(crate) fn new(depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(depth);
        Self {
            filter: Mutex::new(HashSet::new()),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    pub(crate) fn contains(&self, key: &CacheKey) -> bool {
        self.filter.lock().contains(key)
    }

    /// Set the marker and enqueue. Returns false when the key is already in
    /// flight. Blocks when the queue is full; the dedup check caps pressure
    /// per hot key, so callers tolerate the wait.
    pub(crate) async fn admit(&self, key: CacheKey) -> bool {
        if !self.filter.lock().insert(key.clone()) {
            return false;
        }
        if self.tx.send(key.clone()).await.is_err() {
            self.filter.lock().remove(&key);
            return false;
        }
        true
    }

    /// Re-enqueue a key whose marker is still held (retry path). The filter
    /// is deliberately not consulted.
    pub(crate) async fn requeue(&self, key: CacheKey) -> bool {
        self.tx.send(key).await.is_ok()
    }

    /// Drop the marker, making the key admissible again.
    pub(crate) fn release(&self, key: &CacheKey) {
        self.filter.lock().remove(key);
    }

    pub(crate) async fn recv(&self) -> Option<CacheKey> {
        self.rx.lock().await.recv().await
    }

    #[cfg(test)]
    pub(crate) fn marker_count(&self) -> usize {
        self.filter.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CacheKey {
        CacheKey::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_admit_dedupes_until_release() {
        let queue = WorkQueue::new(8);
        assert!(queue.admit(key("f1-s1")).await);
        assert!(!queue.admit(key("f1-s1")).await);
        assert!(queue.contains(&key("f1-s1")));

        assert_eq!(queue.recv().await, Some(key("f1-s1")));
        // marker survives the dequeue; only release clears it
        assert!(queue.contains(&key("f1-s1")));
        queue.release(&key("f1-s1"));
        assert!(!queue.contains(&key("f1-s1")));
        assert!(queue.admit(key("f1-s1")).await);
    }

    #[tokio::test]
    async fn test_requeue_bypasses_filter() {
        let queue = WorkQueue::new(8);
        assert!(queue.admit(key("f1-s1")).await);
        assert_eq!(queue.recv().await, Some(key("f1-s1")));
        assert!(queue.requeue(key("f1-s1")).await);
        assert_eq!(queue.recv().await, Some(key("f1-s1")));
        assert_eq!(queue.marker_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_admits_enqueue_exactly_once() {
        use std::sync::Arc;
        let queue = Arc::new(WorkQueue::new(64));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let queue = queue.clone();
            handles.push(tokio::spawn(
                async move { queue.admit(key("f1-s1")).await },
            ));
        }
        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(queue.recv().await, Some(key("f1-s1")));
        assert_eq!(queue.marker_count(), 1);
    }
}
