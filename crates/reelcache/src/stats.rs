//! Cache statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for record store performance tracking
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_serves: AtomicU64,
    evictions: AtomicU64,
    fetch_failures: AtomicU64,
    flag_writes: AtomicU64,
}

impl CacheStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss (fresh entry absent or forced refresh)
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a degraded answer served after a fetch failure
    pub fn record_stale_serve(&self) {
        self.stale_serves.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an eviction
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed fetch
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a durable liked-flag write
    pub fn record_flag_write(&self) {
        self.flag_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get total misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get total degraded answers
    pub fn stale_serves(&self) -> u64 {
        self.stale_serves.load(Ordering::Relaxed)
    }

    /// Get total evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get total fetch failures
    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }

    /// Get total durable liked-flag writes
    pub fn flag_writes(&self) -> u64 {
        self.flag_writes.load(Ordering::Relaxed)
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.stale_serves.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.fetch_failures.store(0, Ordering::Relaxed);
        self.flag_writes.store(0, Ordering::Relaxed);
    }
}

/// Occupancy of one sub-cache
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occupancy {
    /// Resident entries
    pub size: usize,
    /// Maximum entries
    pub capacity: usize,
}

impl Occupancy {
    /// Fraction of capacity in use (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.size as f64 / self.capacity as f64
        }
    }
}

/// Point-in-time view of a record store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    /// Single-record cache
    pub records: Occupancy,
    /// Page cache
    pub pages: Occupancy,
    /// Liked-flag set
    pub liked: Occupancy,
    /// Fresh cache hits
    pub hits: u64,
    /// Misses
    pub misses: u64,
    /// Hit ratio (0.0 to 1.0)
    pub hit_ratio: f64,
    /// Degraded answers after fetch failures
    pub stale_serves: u64,
    /// Evictions across record and page caches
    pub evictions: u64,
    /// Failed fetches
    pub fetch_failures: u64,
    /// Durable liked-flag writes
    pub flag_writes: u64,
}
