//! Handler result cache for the wk renderer.
//!
//! Syntax handlers whose output is expensive but stable for a given context
//! (InterWiki link generation is the main one) store rendered fragments here.
//! Two traits form the API:
//!
//! - [`Cache`]: hands out named buckets
//! - [`CacheBucket`]: key-value store where each value carries an etag
//!
//! # Implementations
//!
//! - [`NullCache`] / [`NullCacheBucket`]: caching disabled, every lookup misses
//! - [`MemoryCache`]: process-local store with a TTL and an entry ceiling
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use wk_cache::{Cache, MemoryCache};
//!
//! let cache = MemoryCache::new(Duration::from_secs(600), 2000);
//! let bucket = cache.bucket("handlers");
//! bucket.set("interwiki:abc", "ctx-1", b"<a href=\"...\">");
//! assert!(bucket.get("interwiki:abc", "ctx-1").is_some());
//! assert!(bucket.get("interwiki:abc", "ctx-2").is_none());
//! ```

mod ext;
mod memory;

pub use ext::CacheBucketExt;
pub use memory::{CacheStats, MemoryCache};

/// A named partition within a [`Cache`].
///
/// A value is returned only when both the key and the etag it was stored
/// with match. Handlers use a context hash as the etag so that a fragment
/// rendered for one context is never served to another.
pub trait CacheBucket: Send + Sync {
    /// Look up a cached value.
    ///
    /// An empty `etag` skips etag validation.
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>>;

    /// Store a value, replacing any previous entry under `key`.
    fn set(&self, key: &str, etag: &str, value: &[u8]);

    /// Drop the entry stored under `key`, if any.
    fn remove(&self, _key: &str) {}

    /// Drop every entry in this bucket.
    fn clear(&self) {}
}

/// Factory for named [`CacheBucket`]s.
///
/// Buckets with different names never see each other's entries. Opening the
/// same name twice yields handles onto the same entries.
pub trait Cache: Send + Sync {
    /// Open or create a named bucket.
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket>;
}

/// [`CacheBucket`] that stores nothing.
pub struct NullCacheBucket;

impl CacheBucket for NullCacheBucket {
    fn get(&self, _key: &str, _etag: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _etag: &str, _value: &[u8]) {}
}

/// [`Cache`] used when handler caching is turned off.
pub struct NullCache;

impl Cache for NullCache {
    fn bucket(&self, _name: &str) -> Box<dyn CacheBucket> {
        Box::new(NullCacheBucket)
    }
}
