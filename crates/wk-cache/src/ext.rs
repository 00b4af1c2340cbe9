//! Typed helpers layered over [`CacheBucket`].

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CacheBucket;

/// String and JSON access for any [`CacheBucket`].
///
/// Kept as a blanket extension so the bucket trait itself stays object safe
/// and free of serde bounds.
pub trait CacheBucketExt: CacheBucket {
    /// Cached UTF-8 string, or `None` on miss, etag mismatch or bad UTF-8.
    fn get_string(&self, key: &str, etag: &str) -> Option<String> {
        let bytes = self.get(key, etag)?;
        String::from_utf8(bytes).ok()
    }

    /// Store a string.
    fn set_string(&self, key: &str, etag: &str, value: &str) {
        self.set(key, etag, value.as_bytes());
    }

    /// Cached JSON value. Deserialization failures count as a miss.
    fn get_json<T: DeserializeOwned>(&self, key: &str, etag: &str) -> Option<T> {
        let bytes = self.get(key, etag)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Store a value as JSON. Serialization failures are logged and skipped.
    fn set_json<T: Serialize>(&self, key: &str, etag: &str, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set(key, etag, &bytes),
            Err(e) => tracing::warn!(key, error = %e, "Failed to encode cache entry"),
        }
    }
}

impl<B: CacheBucket + ?Sized> CacheBucketExt for B {}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{Cache, MemoryCache};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Fragment {
        html: String,
        handler: String,
    }

    #[test]
    fn test_string_roundtrip_respects_etag() {
        let cache = MemoryCache::new(Duration::from_secs(60), 10);
        let bucket = cache.bucket("handlers");

        bucket.set_string("k", "ctx", "<a>x</a>");

        assert_eq!(bucket.get_string("k", "ctx").as_deref(), Some("<a>x</a>"));
        assert_eq!(bucket.get_string("k", "other"), None);
    }

    #[test]
    fn test_json_value() {
        let cache = MemoryCache::new(Duration::from_secs(60), 10);
        let bucket = cache.bucket("handlers");
        let fragment = Fragment {
            html: "<a>".to_owned(),
            handler: "interwiki".to_owned(),
        };

        bucket.set_json("k", "e", &fragment);

        assert_eq!(bucket.get_json::<Fragment>("k", "e"), Some(fragment));
    }

    #[test]
    fn test_invalid_utf8_is_a_miss() {
        let cache = MemoryCache::new(Duration::from_secs(60), 10);
        let bucket = cache.bucket("handlers");
        bucket.set("k", "e", &[0xff, 0xfe]);

        assert_eq!(bucket.get_string("k", "e"), None);
        assert_eq!(bucket.get_json::<Fragment>("k", "e"), None);
    }
}
