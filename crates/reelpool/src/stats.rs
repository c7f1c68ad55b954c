//! Pool statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime counters of a pool
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    created: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    destroyed: AtomicU64,
    discarded: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, timed_out: bool) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_destroyed(&self) {
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Ready sessions plus running creations
    pub live: usize,
    /// Running creations, including ones whose position left the window
    pub initializing: usize,
    /// Sessions ready for playback
    pub ready: usize,
    /// Positions marked failed
    pub failed: usize,
    /// Maximum live sessions
    pub max_concurrent: usize,
    /// Sessions that reached Ready
    pub created: u64,
    /// Creations that failed, timeouts included
    pub failures: u64,
    /// Creations that hit the deadline
    pub timeouts: u64,
    /// Sessions destroyed by teardown
    pub destroyed: u64,
    /// Finished creations thrown away because their position was torn down
    pub discarded: u64,
    /// Teardown-all count
    pub generation: u64,
}

impl PoolStats {
    pub(crate) fn with_counters(mut self, counters: &PoolCounters) -> Self {
        self.created = counters.created.load(Ordering::Relaxed);
        self.failures = counters.failures.load(Ordering::Relaxed);
        self.timeouts = counters.timeouts.load(Ordering::Relaxed);
        self.destroyed = counters.destroyed.load(Ordering::Relaxed);
        self.discarded = counters.discarded.load(Ordering::Relaxed);
        self
    }
}
