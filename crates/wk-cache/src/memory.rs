//! In-memory cache with time-based expiry and a size ceiling.
//!
//! Every bucket of a [`MemoryCache`] shares the same TTL and entry limit.
//! When a bucket is full, expired entries are purged first; if that frees
//! nothing, the oldest entry is evicted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::{Cache, CacheBucket};

/// Hit and miss counters for one [`MemoryCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

struct Entry {
    etag: String,
    value: Vec<u8>,
    stored_at: Instant,
}

struct Store {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
    max_entries: usize,
    counters: Arc<Counters>,
}

impl Store {
    fn is_live(&self, entry: &Entry, now: Instant) -> bool {
        now.duration_since(entry.stored_at) < self.ttl
    }

    fn make_room(&self, entries: &mut HashMap<String, Entry>, now: Instant) {
        if entries.len() < self.max_entries {
            return;
        }
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.stored_at) < self.ttl);
        let mut evicted = before - entries.len();

        while entries.len() >= self.max_entries {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            entries.remove(&oldest);
            evicted += 1;
        }

        if evicted > 0 {
            self.counters
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
            tracing::debug!(evicted, "Evicted handler cache entries");
        }
    }
}

/// Process-local [`Cache`] backed by hash maps.
pub struct MemoryCache {
    buckets: RwLock<HashMap<String, Arc<Store>>>,
    ttl: Duration,
    max_entries: usize,
    counters: Arc<Counters>,
}

impl MemoryCache {
    /// Create a cache whose entries live for `ttl` and whose buckets hold at
    /// most `max_entries` values each.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Snapshot of the hit/miss counters across all buckets.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    fn store(&self, name: &str) -> Arc<Store> {
        if let Some(store) = self
            .buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Arc::clone(store);
        }
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let store = buckets.entry(name.to_owned()).or_insert_with(|| {
            Arc::new(Store {
                entries: Mutex::new(HashMap::new()),
                ttl: self.ttl,
                max_entries: self.max_entries,
                counters: Arc::clone(&self.counters),
            })
        });
        Arc::clone(store)
    }
}

impl Cache for MemoryCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        Box::new(MemoryCacheBucket {
            store: self.store(name),
        })
    }
}

struct MemoryCacheBucket {
    store: Arc<Store>,
}

impl CacheBucket for MemoryCacheBucket {
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let mut entries = self
            .store
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let hit = match entries.get(key) {
            Some(entry) if !self.store.is_live(entry, now) => {
                entries.remove(key);
                None
            }
            Some(entry) if etag.is_empty() || entry.etag == etag => Some(entry.value.clone()),
            _ => None,
        };

        let counter = if hit.is_some() {
            &self.store.counters.hits
        } else {
            &self.store.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    fn set(&self, key: &str, etag: &str, value: &[u8]) {
        let now = Instant::now();
        let mut entries = self
            .store
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(key) {
            self.store.make_room(&mut entries, now);
        }
        entries.insert(
            key.to_owned(),
            Entry {
                etag: etag.to_owned(),
                value: value.to_vec(),
                stored_at: now,
            },
        );
    }

    fn remove(&self, key: &str) {
        self.store
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn clear(&self) {
        self.store
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn cache() -> MemoryCache {
        MemoryCache::new(Duration::from_secs(600), 3)
    }

    #[test]
    fn test_hit_requires_matching_etag() {
        let cache = cache();
        let bucket = cache.bucket("handlers");
        bucket.set("key", "ctx-a", b"value");

        assert_eq!(bucket.get("key", "ctx-a"), Some(b"value".to_vec()));
        assert_eq!(bucket.get("key", "ctx-b"), None);
        assert_eq!(bucket.get("key", ""), Some(b"value".to_vec()));
    }

    #[test]
    fn test_buckets_are_isolated_but_shared_by_name() {
        let cache = cache();
        cache.bucket("a").set("key", "e", b"from-a");

        assert_eq!(cache.bucket("b").get("key", "e"), None);
        assert_eq!(cache.bucket("a").get("key", "e"), Some(b"from-a".to_vec()));
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache = MemoryCache::new(Duration::ZERO, 10);
        let bucket = cache.bucket("handlers");
        bucket.set("key", "e", b"value");

        assert_eq!(bucket.get("key", "e"), None);
    }

    #[test]
    fn test_full_bucket_evicts_oldest() {
        let cache = cache();
        let bucket = cache.bucket("handlers");
        bucket.set("one", "e", b"1");
        std::thread::sleep(Duration::from_millis(2));
        bucket.set("two", "e", b"2");
        std::thread::sleep(Duration::from_millis(2));
        bucket.set("three", "e", b"3");
        std::thread::sleep(Duration::from_millis(2));
        bucket.set("four", "e", b"4");

        assert_eq!(bucket.get("one", "e"), None);
        assert_eq!(bucket.get("four", "e"), Some(b"4".to_vec()));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = cache();
        let bucket = cache.bucket("handlers");
        bucket.set("one", "e", b"1");
        bucket.set("two", "e", b"2");
        bucket.set("three", "e", b"3");
        bucket.set("three", "e2", b"3b");

        assert_eq!(bucket.get("one", "e"), Some(b"1".to_vec()));
        assert_eq!(bucket.get("three", "e2"), Some(b"3b".to_vec()));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let cache = cache();
        let bucket = cache.bucket("handlers");
        bucket.set("key", "e", b"v");
        bucket.get("key", "e");
        bucket.get("key", "x");
        bucket.get("missing", "e");

        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 2,
                evictions: 0
            }
        );
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = cache();
        let bucket = cache.bucket("handlers");
        bucket.set("a", "e", b"1");
        bucket.set("b", "e", b"2");

        bucket.remove("a");
        assert_eq!(bucket.get("a", "e"), None);

        bucket.clear();
        assert_eq!(bucket.get("b", "e"), None);
    }
}
