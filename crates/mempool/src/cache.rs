//! LRU cache of recently seen transaction keys.

use ostracon_types::TxKey;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

struct CacheInner {
    // Recency is a monotonically increasing stamp; the BTreeMap front is
    // always the least recently seen key.
    by_key: HashMap<TxKey, u64>,
    by_age: BTreeMap<u64, TxKey>,
    stamp: u64,
}

/// Fixed-capacity LRU set of [`TxKey`]s.
///
/// A capacity of zero disables the cache entirely: every push reports the
/// key as fresh and nothing is retained.
pub struct TxCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl TxCache {
    /// A cache holding up to `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner {
                by_key: HashMap::new(),
                by_age: BTreeMap::new(),
                stamp: 0,
            }),
        }
    }

    /// Record `key`. Returns `false` if it was already cached, refreshing
    /// its recency; `true` if it was inserted, evicting the least recently
    /// seen key when over capacity.
    pub fn push(&self, key: TxKey) -> bool {
        if self.capacity == 0 {
            return true;
        }
        let mut inner = self.inner.lock();
        inner.stamp += 1;
        let stamp = inner.stamp;
        if let Some(old) = inner.by_key.insert(key, stamp) {
            inner.by_age.remove(&old);
            inner.by_age.insert(stamp, key);
            return false;
        }
        inner.by_age.insert(stamp, key);
        if inner.by_key.len() > self.capacity {
            if let Some((&oldest, &evicted)) = inner.by_age.iter().next() {
                inner.by_age.remove(&oldest);
                inner.by_key.remove(&evicted);
            }
        }
        true
    }

    /// Forget `key` if cached.
    pub fn remove(&self, key: &TxKey) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        if let Some(stamp) = inner.by_key.remove(key) {
            inner.by_age.remove(&stamp);
        }
    }

    /// Whether `key` is currently cached.
    pub fn contains(&self, key: &TxKey) -> bool {
        self.capacity != 0 && self.inner.lock().by_key.contains_key(key)
    }

    /// Drop everything.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.by_key.clear();
        inner.by_age.clear();
        inner.stamp = 0;
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.inner.lock().by_key.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ostracon_types::Tx;

    fn key(b: u8) -> TxKey {
        Tx::from(vec![b]).key()
    }

    #[test]
    fn test_push_is_idempotent() {
        let cache = TxCache::new(10);
        assert!(cache.push(key(1)));
        assert!(!cache.push(key(1)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_seen() {
        let cache = TxCache::new(2);
        cache.push(key(1));
        cache.push(key(2));
        // Refresh key 1; key 2 becomes the eviction candidate.
        cache.push(key(1));
        cache.push(key(3));
        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = TxCache::new(0);
        assert!(cache.push(key(1)));
        assert!(cache.push(key(1)));
        assert!(!cache.contains(&key(1)));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_remove_and_reset() {
        let cache = TxCache::new(4);
        cache.push(key(1));
        cache.push(key(2));
        cache.remove(&key(1));
        assert!(!cache.contains(&key(1)));
        cache.reset();
        assert!(cache.is_empty());
    }
}
