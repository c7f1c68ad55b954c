//! Freshness tracking over a bounded cache
//!
//! Presence and freshness are separate questions: an entry can be resident
//! but stale, which is exactly what fallback paths want to serve when the
//! network is down.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use ahash::RandomState;
use tracing::trace;

use crate::clock::Clock;
use crate::error::CacheError;
use crate::lru::BoundedCache;

/// Bounded LRU cache with per-key write timestamps and a shared TTL
pub struct TimedCache<K, V> {
    cache: BoundedCache<K, V>,
    freshness: HashMap<K, Instant, RandomState>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TimedCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a cache of `capacity` entries that go stale after `ttl`
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "cache ttl must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            cache: BoundedCache::new(capacity)?,
            freshness: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            ttl,
            clock,
        })
    }

    /// Insert or replace, refreshing the key's timestamp.
    ///
    /// Returns the entry evicted to make room, if any.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.freshness.insert(key.clone(), self.clock.now());
        let evicted = self.cache.put(key, value);

        // Timestamps of evicted keys are harmless but would accumulate.
        if self.freshness.len() > self.cache.capacity() * 2 {
            self.prune_freshness();
        }
        evicted
    }

    /// Whether the key was written less than `ttl` ago.
    ///
    /// Independent of presence; see [`get_if_valid`](Self::get_if_valid).
    pub fn valid<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.freshness.get(key) {
            Some(written) => self.clock.now().saturating_duration_since(*written) < self.ttl,
            None => false,
        }
    }

    /// Value if both present and fresh; promotes on hit
    pub fn get_if_valid<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if !self.valid(key) {
            return None;
        }
        self.cache.get(key)
    }

    /// Value regardless of freshness; promotes on hit
    pub fn get_even_if_stale<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.get(key)
    }

    /// Value regardless of freshness, without promotion
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.peek(key)
    }

    /// Modify a resident value in place without refreshing its timestamp
    /// or recency. Returns whether the key was present.
    pub fn update<Q, F>(&mut self, key: &Q, f: F) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&mut V),
    {
        match self.cache.peek_mut(key) {
            Some(value) => {
                f(value);
                true
            }
            None => false,
        }
    }

    /// Time since the key was last written
    pub fn age<Q>(&self, key: &Q) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.freshness
            .get(key)
            .map(|written| self.clock.now().saturating_duration_since(*written))
    }

    /// Check presence (fresh or stale)
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.contains(key)
    }

    /// Remove a key and its timestamp
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.freshness.remove(key);
        self.cache.remove(key)
    }

    /// Drop every entry and timestamp
    pub fn clear(&mut self) {
        self.cache.clear();
        self.freshness.clear();
    }

    /// Forget timestamps of keys no longer resident
    pub fn prune_freshness(&mut self) {
        let before = self.freshness.len();
        let cache = &self.cache;
        self.freshness.retain(|key, _| cache.contains(key));
        trace!(dropped = before - self.freshness.len(), "pruned freshness map");
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if no entries are resident
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Maximum number of resident entries
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Configured freshness window
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Resident values, least recently used first
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.cache.values()
    }

    /// Resident keys, least recently used first
    pub fn keys(&self) -> Vec<K> {
        self.cache.keys()
    }
}
