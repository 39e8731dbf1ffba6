use std::fmt::Write as _;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use feedgate_types::{CacheConfig, Category, Params};
use lru::LruCache;
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// LRU-bounded cache whose entries expire a fixed TTL after insertion.
pub struct TtlCache<V> {
    inner: Mutex<LruCache<String, Entry<V>>>,
    ttl: Duration,
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<V: Clone> TtlCache<V> {
    /// Cache holding at most `capacity` entries (minimum one).
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl,
        }
    }

    /// Cache from configuration; `None` when the TTL is zero.
    #[must_use]
    pub fn from_config(cfg: &CacheConfig) -> Option<Self> {
        (cfg.ttl_ms > 0).then(|| Self::new(cfg.capacity, cfg.ttl()))
    }

    /// Configured time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Value for `key` if present and not yet expired.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now()).await
    }

    /// Lookup as of `now`; an expired entry is evicted and reads as a miss.
    pub async fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut guard = self.inner.lock().await;
        if let Some(entry) = guard.get(key)
            && entry.expires_at > now
        {
            return Some(entry.value.clone());
        }
        guard.pop(key);
        None
    }

    /// Store `value` until `now + ttl`.
    pub async fn set(&self, key: impl Into<String>, value: V) {
        self.set_at(key, value, Instant::now()).await;
    }

    /// Store as of `now`.
    pub async fn set_at(&self, key: impl Into<String>, value: V, now: Instant) {
        let expires_at = now + self.ttl;
        self.inner
            .lock()
            .await
            .put(key.into(), Entry { value, expires_at });
    }

    /// Drop one entry; returns whether it was present.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.inner.lock().await.pop(key).is_some()
    }

    /// Drop everything.
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    /// Number of stored entries, expired ones included until read.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// True when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Stable cache key for a category and its parameters.
///
/// Parameters are already sorted by name, so insertion order never changes
/// the key. Names and values both render as JSON: quoted names cannot run
/// into the separators, and `"1"` stays distinct from `1`.
#[must_use]
pub fn cache_key(category: Category, params: &Params) -> String {
    let mut key = String::from(category.as_str());
    key.push('?');
    for (i, (k, v)) in params.iter().enumerate() {
        if i > 0 {
            key.push('&');
        }
        let _ = write!(key, "{}={v}", Value::from(k));
    }
    key
}
