//! RecordStore: record cache, page cache and durable liked flags
//!
//! Read paths never fail: a fetch error degrades to whatever is cached.
//! Locks are taken in the order liked → records → pages → in-flight and
//! never held across an `.await`, so every read-modify-write is atomic with
//! respect to other tasks.

use std::collections::HashMap;
use std::sync::Arc;
use ahash::RandomState;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::error::{CacheError, StorageError};
use crate::liked::LikedFlags;
use crate::persist::DebouncedWriter;
use crate::record::{Page, PageKey, PageSource, Record, RecordId};
use crate::source::{FlagStorage, RecordSource};
use crate::stats::{CacheStats, Occupancy, StoreStats};
use crate::timed::TimedCache;

/// State captured before an optimistic mutation
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LikeSnapshot {
    pub(crate) record: Option<Record>,
    pub(crate) flag: Option<bool>,
}

struct Shared {
    records: Mutex<TimedCache<RecordId, Record>>,
    pages: Mutex<TimedCache<PageKey, Vec<Record>>>,
    liked: Mutex<LikedFlags>,
    /// Ids with an unconfirmed mutation → server flag seen by a fetch since
    in_flight: Mutex<HashMap<RecordId, Option<bool>, RandomState>>,
    source: Arc<dyn RecordSource>,
    flag_storage: Arc<dyn FlagStorage>,
    writer: DebouncedWriter,
    stats: CacheStats,
}

/// Cached access to feed records.
///
/// Cheap to clone; clones share the same caches.
#[derive(Clone)]
pub struct RecordStore {
    shared: Arc<Shared>,
}

impl RecordStore {
    /// Create a store using the system clock
    pub fn new(
        config: StoreConfig,
        source: Arc<dyn RecordSource>,
        flag_storage: Arc<dyn FlagStorage>,
    ) -> Result<Self, CacheError> {
        Self::with_clock(config, source, flag_storage, Arc::new(SystemClock))
    }

    /// Create a store with an explicit time source
    pub fn with_clock(
        config: StoreConfig,
        source: Arc<dyn RecordSource>,
        flag_storage: Arc<dyn FlagStorage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CacheError> {
        config.validate()?;

        let mut liked = LikedFlags::new(config.liked_capacity, config.liked_trim_to)?;
        let saved = flag_storage.load_flags();
        let loaded = saved.len();
        liked.load(saved);
        info!(loaded, kept = liked.len(), "liked flags loaded");

        let shared = Shared {
            records: Mutex::new(TimedCache::new(
                config.record_capacity,
                config.ttl,
                Arc::clone(&clock),
            )?),
            pages: Mutex::new(TimedCache::new(config.page_capacity, config.ttl, clock)?),
            liked: Mutex::new(liked),
            in_flight: Mutex::new(HashMap::default()),
            source,
            flag_storage,
            writer: DebouncedWriter::new(config.persist_debounce),
            stats: CacheStats::new(),
        };

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// One page of a collection.
    ///
    /// Serves a fresh cached page unless `force_refresh`; otherwise fetches.
    /// On fetch failure falls back to the stale page, then to a slice of
    /// cached records, then to an empty page.
    pub async fn get_page(&self, key: &PageKey, force_refresh: bool) -> Page {
        let shared = &self.shared;

        if !force_refresh {
            let hit = shared.pages.lock().get_if_valid(key).cloned();
            if let Some(records) = hit {
                shared.stats.record_hit();
                return Page {
                    records: self.hydrate(records),
                    source: PageSource::Cache,
                };
            }
        }
        shared.stats.record_miss();

        match shared.source.fetch_page(key).await {
            Ok(records) => {
                let records = self.cache_fetched(records);
                if shared.pages.lock().put(key.clone(), records.clone()).is_some() {
                    shared.stats.record_eviction();
                }
                debug!(collection = %key.collection, page = key.page, count = records.len(), "page fetched");
                Page {
                    records,
                    source: PageSource::Network,
                }
            }
            Err(e) => {
                shared.stats.record_fetch_failure();
                warn!(collection = %key.collection, page = key.page, error = %e, "page fetch failed, degrading to cache");
                self.degraded_page(key)
            }
        }
    }

    /// A single record.
    ///
    /// On fetch failure returns the cached record even if stale.
    pub async fn get_record(&self, id: &str, force_refresh: bool) -> Option<Record> {
        let shared = &self.shared;

        if !force_refresh {
            let hit = shared.records.lock().get_if_valid(id).cloned();
            if hit.is_some() {
                shared.stats.record_hit();
                return hit;
            }
        }
        shared.stats.record_miss();

        match shared.source.fetch_record(id).await {
            Ok(record) => self.cache_fetched(vec![record]).pop(),
            Err(e) => {
                shared.stats.record_fetch_failure();
                warn!(id, error = %e, "record fetch failed, degrading to cache");
                let cached = shared.records.lock().get_even_if_stale(id).cloned();
                if cached.is_some() {
                    shared.stats.record_stale_serve();
                }
                cached
            }
        }
    }

    /// Cached record without fetching or touching recency
    pub fn cached_record(&self, id: &str) -> Option<Record> {
        self.shared.records.lock().peek(id).cloned()
    }

    /// Liked state: flag override, else the cached record, else false
    pub fn is_liked(&self, id: &str) -> bool {
        if let Some(flag) = self.shared.liked.lock().get(id) {
            return flag;
        }
        self.shared
            .records
            .lock()
            .peek(id)
            .map(|record| record.is_liked)
            .unwrap_or(false)
    }

    /// Set the liked flag and schedule a debounced durable write.
    ///
    /// The cached record's flag follows; its counter is left alone.
    pub fn set_liked(&self, id: &str, liked: bool) {
        self.write_flag(id, liked, |record| record.is_liked = liked);
    }

    /// Write liked flags now if a write is owed, cancelling the timer.
    ///
    /// Call before the process is suspended.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.shared.writer.cancel();
        persist_liked(&self.shared)
    }

    /// Whether liked flags have changes not yet written durably
    pub fn has_pending_writes(&self) -> bool {
        self.shared.writer.is_pending()
    }

    /// Drop all cached records, pages and liked flags, including the durable copy
    pub fn invalidate_all(&self) -> Result<(), StorageError> {
        let shared = &self.shared;
        shared.writer.cancel();
        shared.writer.take_pending();

        {
            let mut liked = shared.liked.lock();
            let mut records = shared.records.lock();
            let mut pages = shared.pages.lock();
            liked.clear();
            records.clear();
            pages.clear();
        }

        info!("record store invalidated");
        shared.flag_storage.clear_flags()
    }

    /// Occupancy and counters of every sub-cache
    pub fn cache_stats(&self) -> StoreStats {
        let shared = &self.shared;
        let liked = {
            let liked = shared.liked.lock();
            Occupancy {
                size: liked.len(),
                capacity: liked.capacity(),
            }
        };
        let records = {
            let records = shared.records.lock();
            Occupancy {
                size: records.len(),
                capacity: records.capacity(),
            }
        };
        let pages = {
            let pages = shared.pages.lock();
            Occupancy {
                size: pages.len(),
                capacity: pages.capacity(),
            }
        };
        let stats = &shared.stats;

        StoreStats {
            records,
            pages,
            liked,
            hits: stats.hits(),
            misses: stats.misses(),
            hit_ratio: stats.hit_ratio(),
            stale_serves: stats.stale_serves(),
            evictions: stats.evictions(),
            fetch_failures: stats.fetch_failures(),
            flag_writes: stats.flag_writes(),
        }
    }

    /// Capture the state of `id` and start tracking fetches of it until
    /// [`settle`](Self::settle) or [`restore`](Self::restore)
    pub(crate) fn snapshot(&self, id: &str) -> LikeSnapshot {
        let liked = self.shared.liked.lock();
        let records = self.shared.records.lock();
        self.shared.in_flight.lock().insert(id.to_string(), None);
        LikeSnapshot {
            flag: liked.get(id),
            record: records.peek(id).cloned(),
        }
    }

    /// The mutation of `id` was confirmed
    pub(crate) fn settle(&self, id: &str) {
        self.shared.in_flight.lock().remove(id);
    }

    /// Effective liked state plus counter move, applied together
    pub(crate) fn apply_like(&self, id: &str, liked: bool) {
        self.write_flag(id, liked, |record| record.apply_like(liked));
    }

    /// Put back exactly what [`snapshot`](Self::snapshot) saw and mark the
    /// flags dirty; the caller decides when to flush.
    pub(crate) fn restore(&self, id: &str, snapshot: &LikeSnapshot) {
        let shared = &self.shared;
        shared.writer.cancel();
        let fetched_flag = shared.in_flight.lock().remove(id).flatten();
        {
            let mut liked = shared.liked.lock();
            let mut records = shared.records.lock();
            let mut pages = shared.pages.lock();
            liked.restore(id, snapshot.flag);

            match &snapshot.record {
                Some(previous) => {
                    let replaced = records.update(id, |current| *current = previous.clone());
                    if !replaced {
                        records.put(id.to_string(), previous.clone());
                    }
                }
                None => {
                    // Fetched while the mutation was in flight and stamped
                    // with the optimistic flag; put back what was there before.
                    if let Some(flag) = snapshot.flag.or(fetched_flag) {
                        records.update(id, |current| current.is_liked = flag);
                        for key in pages.keys() {
                            pages.update(&key, |entries| {
                                for entry in entries.iter_mut().filter(|e| e.id == id) {
                                    entry.is_liked = flag;
                                }
                            });
                        }
                    }
                }
            }
        }
        shared.writer.mark_pending();
    }

    fn write_flag<F>(&self, id: &str, liked: bool, update_record: F)
    where
        F: FnOnce(&mut Record),
    {
        let shared = &self.shared;
        {
            let mut flags = shared.liked.lock();
            let mut records = shared.records.lock();
            let trimmed = flags.set(id.to_string(), liked);
            if trimmed > 0 {
                debug!(trimmed, kept = flags.len(), "liked flags trimmed");
            }
            records.update(id, update_record);
        }

        let pending = Arc::clone(shared);
        shared.writer.schedule(move || {
            if let Err(e) = persist_liked(&pending) {
                warn!(error = %e, "debounced liked-flag write failed");
            }
        });
    }

    /// Reconcile fetched records with liked flags and cache them
    fn cache_fetched(&self, mut fetched: Vec<Record>) -> Vec<Record> {
        let shared = &self.shared;
        let liked = shared.liked.lock();
        let mut records = shared.records.lock();
        let mut in_flight = shared.in_flight.lock();

        for record in &mut fetched {
            if let Some(seen) = in_flight.get_mut(&record.id) {
                *seen = Some(record.is_liked);
            }
            if let Some(flag) = liked.get(&record.id) {
                record.is_liked = flag;
            }
            if records.put(record.id.clone(), record.clone()).is_some() {
                shared.stats.record_eviction();
            }
        }
        fetched
    }

    /// Refresh page entries from the record cache and apply flag overrides
    fn hydrate(&self, page: Vec<Record>) -> Vec<Record> {
        let liked = self.shared.liked.lock();
        let records = self.shared.records.lock();

        page.into_iter()
            .map(|entry| {
                let mut record = records.peek(&entry.id).cloned().unwrap_or(entry);
                if let Some(flag) = liked.get(&record.id) {
                    record.is_liked = flag;
                }
                record
            })
            .collect()
    }

    fn degraded_page(&self, key: &PageKey) -> Page {
        let shared = &self.shared;

        let stale = shared.pages.lock().get_even_if_stale(key).cloned();
        if let Some(records) = stale {
            shared.stats.record_stale_serve();
            return Page {
                records: self.hydrate(records),
                source: PageSource::Stale,
            };
        }

        let slice: Vec<Record> = {
            let records = shared.records.lock();
            records
                .values()
                .into_iter()
                .skip(key.offset())
                .take(key.page_size as usize)
                .collect()
        };
        if slice.is_empty() {
            return Page {
                records: Vec::new(),
                source: PageSource::Empty,
            };
        }

        shared.stats.record_stale_serve();
        Page {
            records: self.hydrate(slice),
            source: PageSource::Synthesized,
        }
    }
}

fn persist_liked(shared: &Shared) -> Result<(), StorageError> {
    if !shared.writer.take_pending() {
        return Ok(());
    }

    let ids = shared.liked.lock().liked_ids();
    match shared.flag_storage.save_flags(&ids) {
        Ok(()) => {
            shared.stats.record_flag_write();
            debug!(count = ids.len(), "liked flags written");
            Ok(())
        }
        Err(e) => {
            // Keep the batch owed so the next flush retries it.
            shared.writer.mark_pending();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::FetchError;
    use crate::source::MemoryFlags;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Backend double: serves a fixed catalog, can be switched offline
    #[derive(Default)]
    struct FakeSource {
        catalog: Mutex<Vec<Record>>,
        offline: AtomicBool,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn with_records(n: usize) -> Arc<Self> {
            let source = Self::default();
            *source.catalog.lock() = (0..n)
                .map(|i| {
                    let mut record = Record::new(format!("clip-{}", i), format!("https://cdn/{}.mp4", i));
                    record.likes = 5;
                    record
                })
                .collect();
            Arc::new(source)
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecordSource for FakeSource {
        async fn fetch_page(&self, key: &PageKey) -> Result<Vec<Record>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(FetchError::Network("offline".to_string()));
            }
            Ok(self
                .catalog
                .lock()
                .iter()
                .skip(key.offset())
                .take(key.page_size as usize)
                .cloned()
                .collect())
        }

        async fn fetch_record(&self, id: &str) -> Result<Record, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(FetchError::Timeout);
            }
            self.catalog
                .lock()
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(id.to_string()))
        }
    }

    struct Harness {
        store: RecordStore,
        source: Arc<FakeSource>,
        flags: Arc<MemoryFlags>,
        clock: ManualClock,
    }

    fn harness_with(config: StoreConfig, flags: MemoryFlags) -> Harness {
        let source = FakeSource::with_records(30);
        let flags = Arc::new(flags);
        let clock = ManualClock::new();
        let store = RecordStore::with_clock(
            config,
            source.clone(),
            flags.clone(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        Harness {
            store,
            source,
            flags,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(StoreConfig::default(), MemoryFlags::default())
    }

    fn ids(page: &Page) -> Vec<&str> {
        page.records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_page_cache_hit_skips_network() {
        let h = harness();
        let key = PageKey::new("for_you", 1, 10);

        let first = h.store.get_page(&key, false).await;
        let second = h.store.get_page(&key, false).await;

        assert_eq!(first.source, PageSource::Network);
        assert_eq!(second.source, PageSource::Cache);
        assert_eq!(first.records, second.records);
        assert_eq!(h.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_fetches() {
        let h = harness();
        let key = PageKey::new("for_you", 1, 10);

        h.store.get_page(&key, false).await;
        let page = h.store.get_page(&key, true).await;

        assert_eq!(page.source, PageSource::Network);
        assert_eq!(h.source.calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_page_is_refetched() {
        let h = harness();
        let key = PageKey::new("for_you", 1, 10);

        h.store.get_page(&key, false).await;
        h.clock.advance(Duration::from_secs(5 * 60));
        let page = h.store.get_page(&key, false).await;

        assert_eq!(page.source, PageSource::Network);
        assert_eq!(h.source.calls(), 2);
    }

    #[tokio::test]
    async fn test_degrade_law_serves_previous_page_unchanged() {
        let h = harness();
        let key = PageKey::new("for_you", 2, 10);

        let fetched = h.store.get_page(&key, false).await;
        h.source.set_offline(true);
        let degraded = h.store.get_page(&key, true).await;

        assert_eq!(degraded.source, PageSource::Stale);
        assert!(degraded.is_degraded());
        assert_eq!(degraded.records, fetched.records);
    }

    #[tokio::test]
    async fn test_degrade_synthesizes_from_record_cache() {
        let h = harness();

        h.store.get_page(&PageKey::new("for_you", 1, 10), false).await;
        h.source.set_offline(true);
        let page = h.store.get_page(&PageKey::new("following", 2, 4), false).await;

        assert_eq!(page.source, PageSource::Synthesized);
        assert_eq!(ids(&page), vec!["clip-4", "clip-5", "clip-6", "clip-7"]);
    }

    #[tokio::test]
    async fn test_degrade_to_empty() {
        let h = harness();
        h.source.set_offline(true);

        let page = h.store.get_page(&PageKey::new("for_you", 1, 10), false).await;

        assert_eq!(page.source, PageSource::Empty);
        assert!(page.is_empty());
        assert_eq!(h.store.cache_stats().fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_get_record_degrades_to_stale() {
        let h = harness();

        let fetched = h.store.get_record("clip-3", false).await;
        assert!(fetched.is_some());

        h.clock.advance(Duration::from_secs(3600));
        h.source.set_offline(true);

        assert_eq!(h.store.get_record("clip-3", false).await, fetched);
        assert_eq!(h.store.get_record("clip-4", false).await, None);
        assert_eq!(h.store.cache_stats().stale_serves, 1);
    }

    #[tokio::test]
    async fn test_get_record_cache_hit() {
        let h = harness();

        h.store.get_page(&PageKey::new("for_you", 1, 10), false).await;
        let record = h.store.get_record("clip-2", false).await;

        assert_eq!(record.map(|r| r.id), Some("clip-2".to_string()));
        assert_eq!(h.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_liked_flag_wins_over_server_state() {
        let h = harness_with(
            StoreConfig::default(),
            MemoryFlags::with_ids(vec!["clip-1".to_string()]),
        );

        let page = h.store.get_page(&PageKey::new("for_you", 1, 3), false).await;

        assert!(page.records[1].is_liked);
        assert!(!page.records[0].is_liked);
        assert!(h.store.cached_record("clip-1").unwrap().is_liked);
    }

    #[tokio::test]
    async fn test_is_liked_lookup_order() {
        let h = harness();

        assert!(!h.store.is_liked("clip-1"));

        {
            let mut catalog = h.source.catalog.lock();
            catalog[1].is_liked = true;
        }
        h.store.get_record("clip-1", false).await;
        assert!(h.store.is_liked("clip-1"));

        h.store.set_liked("clip-1", false);
        assert!(!h.store.is_liked("clip-1"));
        assert!(!h.store.cached_record("clip-1").unwrap().is_liked);
    }

    #[tokio::test]
    async fn test_cached_page_reflects_later_like() {
        let h = harness();
        let key = PageKey::new("for_you", 1, 3);

        h.store.get_page(&key, false).await;
        h.store.set_liked("clip-0", true);
        let page = h.store.get_page(&key, false).await;

        assert_eq!(page.source, PageSource::Cache);
        assert!(page.records[0].is_liked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_liked_is_debounced() {
        let h = harness();

        h.store.set_liked("clip-1", true);
        h.store.set_liked("clip-2", true);
        h.store.set_liked("clip-3", true);
        assert!(h.store.has_pending_writes());
        assert_eq!(h.flags.saves(), 0);

        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert_eq!(h.flags.saves(), 1);
        assert_eq!(h.flags.saved(), vec!["clip-1", "clip-2", "clip-3"]);
        assert!(!h.store.has_pending_writes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately_and_cancels_timer() {
        let h = harness();

        h.store.set_liked("clip-1", true);
        h.store.flush().unwrap();
        assert_eq!(h.flags.saves(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.flags.saves(), 1);

        // Nothing owed: flush is a no-op.
        h.store.flush().unwrap();
        assert_eq!(h.flags.saves(), 1);
    }

    #[tokio::test]
    async fn test_unlike_excluded_from_durable_list() {
        let h = harness();

        h.store.set_liked("clip-1", true);
        h.store.set_liked("clip-2", true);
        h.store.set_liked("clip-1", false);
        h.store.flush().unwrap();

        assert_eq!(h.flags.saved(), vec!["clip-2"]);
    }

    #[tokio::test]
    async fn test_liked_flags_trim_by_insertion_order() {
        let config = StoreConfig {
            liked_capacity: 4,
            liked_trim_to: 2,
            ..StoreConfig::default()
        };
        let h = harness_with(config, MemoryFlags::default());

        for n in 0..5 {
            h.store.set_liked(&format!("clip-{}", n), true);
        }
        h.store.flush().unwrap();

        assert_eq!(h.flags.saved(), vec!["clip-3", "clip-4"]);
        assert_eq!(h.store.cache_stats().liked.size, 2);
    }

    #[tokio::test]
    async fn test_invalidate_all_clears_memory_and_durable() {
        let h = harness();

        h.store.get_page(&PageKey::new("for_you", 1, 10), false).await;
        h.store.set_liked("clip-1", true);
        h.store.flush().unwrap();
        h.store.invalidate_all().unwrap();

        let stats = h.store.cache_stats();
        assert_eq!(stats.records.size, 0);
        assert_eq!(stats.pages.size, 0);
        assert_eq!(stats.liked.size, 0);
        assert!(h.flags.saved().is_empty());
        assert!(!h.store.is_liked("clip-1"));
    }

    #[tokio::test]
    async fn test_cache_stats_utilization() {
        let config = StoreConfig {
            record_capacity: 20,
            page_capacity: 4,
            ..StoreConfig::default()
        };
        let h = harness_with(config, MemoryFlags::default());

        for page in 1..=3 {
            h.store.get_page(&PageKey::new("for_you", page, 10), false).await;
        }
        let stats = h.store.cache_stats();

        assert_eq!(stats.records.size, 20);
        assert_eq!(stats.records.utilization(), 1.0);
        assert_eq!(stats.pages.utilization(), 0.75);
        assert_eq!(stats.evictions, 10);
    }

    #[test]
    fn test_invalid_configuration_is_fatal() {
        let config = StoreConfig {
            page_capacity: 0,
            ..StoreConfig::default()
        };
        let result = RecordStore::new(
            config,
            FakeSource::with_records(0),
            Arc::new(MemoryFlags::default()),
        );
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_loaded_flags_are_authoritative() {
        let h = harness_with(
            StoreConfig::default(),
            MemoryFlags::with_ids(vec!["clip-9".to_string()]),
        );

        assert!(h.store.is_liked("clip-9"));
        assert_eq!(h.store.cache_stats().liked.size, 1);
    }
}
