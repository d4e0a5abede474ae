//! Concurrent key to entry index with aggregate size accounting
//!
//! The entry map and the aggregate counter live under one lock so every
//! combined mutation is atomic: `total_size` is never stale relative to
//! the map outside a critical section.

use crate::types::{CacheEntry, CacheKey};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct IndexInner {
    entries: HashMap<CacheKey, CacheEntry>,
    total_size: u64,
}

#[derive(Default)]
pub(crate) struct EntryIndex {
    inner: RwLock<IndexInner>,
}

impl EntryIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner.read().entries.get(key).cloned()
    }

    /// Hit-recording lookup: bumps the access counter and recency stamp.
    pub(crate) fn touch(&self, key: &CacheKey) -> bool {
        let mut inner = self.inner.write();
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.access_count += 1;
                entry.last_accessed_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Upsert an entry. A zero size is a no-op; on overwrite only the size
    /// (and the aggregate, by the delta) changes.
    pub(crate) fn put(&self, key: CacheKey, size: u64) {
        if size == 0 {
            return;
        }
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        match inner.entries.get_mut(&key) {
            Some(entry) => {
                if entry.size != size {
                    inner.total_size = inner.total_size - entry.size + size;
                    entry.size = size;
                }
            }
            None => {
                inner.total_size += size;
                inner.entries.insert(key, CacheEntry::new(size));
            }
        }
    }

    /// Remove an entry, returning its size; a no-op when absent.
    pub(crate) fn remove(&self, key: &CacheKey) -> Option<u64> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let entry = inner.entries.remove(key)?;
        inner.total_size -= entry.size;
        Some(entry.size)
    }

    pub(crate) fn total_size(&self) -> u64 {
        self.inner.read().total_size
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub(crate) fn list(&self) -> Vec<CacheKey> {
        self.inner.read().entries.keys().cloned().collect()
    }

    pub(crate) fn find_present(&self, keys: &[CacheKey]) -> Vec<CacheKey> {
        let inner = self.inner.read();
        keys.iter()
            .filter(|k| inner.entries.contains_key(k))
            .cloned()
            .collect()
    }

    /// Run `f` over the entry map under the read lock. Used by eviction
    /// sampling to avoid cloning the whole map per tick.
    pub(crate) fn with_entries<R>(&self, f: impl FnOnce(&HashMap<CacheKey, CacheEntry>) -> R) -> R {
        f(&self.inner.read().entries)
    }

    /// Export the index keyed by canonical key strings for the snapshot file.
    pub(crate) fn export(&self) -> HashMap<String, CacheEntry> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Insert a fully specified entry, bypassing the upsert defaults. Test
    /// seam for eviction scenarios needing custom recency/frequency fields.
    #[cfg(test)]
    pub(crate) fn insert_raw(&self, key: CacheKey, entry: CacheEntry) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.total_size += entry.size;
        if let Some(old) = inner.entries.insert(key, entry) {
            inner.total_size -= old.size;
        }
    }

    /// Replace the index contents from a snapshot, returning how many
    /// entries were loaded. Unparseable keys are dropped.
    pub(crate) fn import(&self, snapshot: HashMap<String, CacheEntry>) -> usize {
        let mut entries = HashMap::with_capacity(snapshot.len());
        let mut total_size = 0u64;
        for (raw, entry) in snapshot {
            let Some(key) = CacheKey::parse(&raw) else {
                continue;
            };
            total_size += entry.size;
            entries.insert(key, entry);
        }
        let loaded = entries.len();
        let mut inner = self.inner.write();
        inner.entries = entries;
        inner.total_size = total_size;
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u32) -> CacheKey {
        CacheKey::new(format!("f{}", n), "s1")
    }

    #[test]
    fn test_put_new_entry_adds_size() {
        let index = EntryIndex::new();
        index.put(key(1), 100);
        assert_eq!(index.lookup(&key(1)).unwrap().size, 100);
        assert_eq!(index.total_size(), 100);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_put_overwrite_adjusts_aggregate_by_delta() {
        let index = EntryIndex::new();
        index.put(key(1), 100);
        index.put(key(2), 50);
        index.put(key(1), 70);
        assert_eq!(index.lookup(&key(1)).unwrap().size, 70);
        assert_eq!(index.total_size(), 120);
    }

    #[test]
    fn test_put_zero_size_is_noop() {
        let index = EntryIndex::new();
        index.put(key(1), 0);
        assert!(index.lookup(&key(1)).is_none());
        assert_eq!(index.total_size(), 0);
    }

    #[test]
    fn test_remove_subtracts_exactly_the_removed_size() {
        let index = EntryIndex::new();
        index.put(key(1), 100);
        index.put(key(2), 40);
        assert_eq!(index.remove(&key(1)), Some(100));
        assert!(index.lookup(&key(1)).is_none());
        assert_eq!(index.total_size(), 40);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let index = EntryIndex::new();
        index.put(key(1), 100);
        assert_eq!(index.remove(&key(2)), None);
        assert_eq!(index.total_size(), 100);
    }

    #[test]
    fn test_touch_bumps_access_count_and_recency() {
        let index = EntryIndex::new();
        index.put(key(1), 10);
        let before = index.lookup(&key(1)).unwrap();
        assert!(index.touch(&key(1)));
        let after = index.lookup(&key(1)).unwrap();
        assert_eq!(after.access_count, before.access_count + 1);
        assert!(after.last_accessed_at >= before.last_accessed_at);
        assert!(!index.touch(&key(9)));
    }

    #[test]
    fn test_find_present_filters_to_indexed_keys() {
        let index = EntryIndex::new();
        index.put(key(1), 10);
        index.put(key(3), 10);
        let present = index.find_present(&[key(1), key(2), key(3)]);
        assert_eq!(present.len(), 2);
        assert!(present.contains(&key(1)));
        assert!(present.contains(&key(3)));
    }

    #[test]
    fn test_export_import_round_trip() {
        let index = EntryIndex::new();
        index.put(key(1), 10);
        index.put(key(2), 30);
        let snapshot = index.export();

        let restored = EntryIndex::new();
        assert_eq!(restored.import(snapshot), 2);
        assert_eq!(restored.total_size(), 40);
        assert_eq!(restored.lookup(&key(2)).unwrap().size, 30);
    }

    #[test]
    fn test_import_drops_unparseable_keys() {
        let mut snapshot = HashMap::new();
        snapshot.insert("badkey".to_string(), CacheEntry::new(10));
        snapshot.insert("f1-s1".to_string(), CacheEntry::new(20));
        let index = EntryIndex::new();
        assert_eq!(index.import(snapshot), 1);
        assert_eq!(index.total_size(), 20);
    }

    #[test]
    fn test_concurrent_puts_keep_aggregate_consistent() {
        use std::sync::Arc;
        let index = Arc::new(EntryIndex::new());
        let mut handles = Vec::new();
        for t in 0..8u32 {
            let index = index.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100u32 {
                    index.put(CacheKey::new(format!("f{}", t), format!("s{}", i)), 5);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(index.len(), 800);
        assert_eq!(index.total_size(), 4000);
    }
}
