//! Stale-read cache: last-known-good fallback for read paths.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::clock::Clock;

/// A value returned from a cached read path.
///
/// `fresh` is false when the value came from the cache because the live
/// path failed. Callers must propagate the flag rather than presenting
/// stale data as authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedValue<V> {
    pub value: V,
    pub fresh: bool,
}

impl<V> CachedValue<V> {
    /// Wraps a value read from the live path.
    pub fn fresh(value: V) -> Self {
        Self { value, fresh: true }
    }

    /// Wraps a value served from the cache after a live failure.
    pub fn stale(value: V) -> Self {
        Self {
            value,
            fresh: false,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Time-bounded cache of the last known-good response per key.
///
/// Every successful live read supersedes the entry for its key; when the
/// live path fails, [`get_stale`](Self::get_stale) serves the stored
/// value for up to `ttl` after it was stored. Entries are shared across
/// all callers in the process and reset on restart.
pub struct StaleReadCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> StaleReadCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache with the given time-to-live for stale serving.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Stores a known-good value for `key`, superseding any prior entry.
    pub fn store(&self, key: K, value: V) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: self.clock.now(),
            },
        );
    }

    /// Returns the stored value for `key` if it is still within the TTL.
    pub fn get_stale(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(key)?;
        if self.clock.now().duration_since(entry.stored_at) < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Number of entries currently stored (including expired ones).
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Returns true if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}
