//! Feed controller: the call site tying the record store to the pool
//!
//! A focus change tears down sessions that left the window, resolves the
//! record at the new position through the cache, activates its session,
//! then preloads neighbors one at a time (next before previous). A preload
//! whose focus has moved on by the time its stagger elapses is skipped.

use tokio::time::sleep;
use tracing::{debug, info};

use reelcache::{OptimisticMutator, PageKey, Record, RecordStore, StorageError};
use reelpool::{Outcome, ResourcePool, SessionFactory};

/// What a focus change did
#[derive(Debug, Clone, PartialEq)]
pub struct FocusReport {
    /// Focused position
    pub position: i64,
    /// Record at the position, if the feed reaches that far
    pub record: Option<Record>,
    /// Activation result; `None` when there is no record
    pub outcome: Option<Outcome>,
}

/// Drives a [`RecordStore`] and a [`ResourcePool`] from feed positions
pub struct FeedController<F: SessionFactory> {
    store: RecordStore,
    mutator: OptimisticMutator,
    pool: ResourcePool<F>,
    collection: String,
    page_size: u32,
}

impl<F: SessionFactory> Clone for FeedController<F> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            mutator: self.mutator.clone(),
            pool: self.pool.clone(),
            collection: self.collection.clone(),
            page_size: self.page_size,
        }
    }
}

impl<F: SessionFactory> FeedController<F> {
    /// Controller for one collection, paged by `page_size`
    pub fn new(
        mutator: OptimisticMutator,
        pool: ResourcePool<F>,
        collection: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            store: mutator.store().clone(),
            mutator,
            pool,
            collection: collection.into(),
            page_size: page_size.max(1),
        }
    }

    /// The record store
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// The session pool
    pub fn pool(&self) -> &ResourcePool<F> {
        &self.pool
    }

    /// Page holding `position` and the index within it
    pub fn locate(&self, position: i64) -> Option<(PageKey, usize)> {
        let position = u64::try_from(position).ok()?;
        let size = u64::from(self.page_size);
        let page = u32::try_from(position / size + 1).ok()?;
        let key = PageKey::new(self.collection.clone(), page, self.page_size);
        Some((key, (position % size) as usize))
    }

    /// Record at `position`, through the page cache
    pub async fn record_at(&self, position: i64) -> Option<Record> {
        let (key, index) = self.locate(position)?;
        let page = self.store.get_page(&key, false).await;
        page.records.into_iter().nth(index)
    }

    /// Move the focus to `position` and play it
    pub async fn focus(&self, position: i64) -> FocusReport {
        self.pool.set_focus(position).await;

        let record = self.record_at(position).await;
        let outcome = match &record {
            Some(record) => Some(self.pool.activate(position, &record.video_url).await),
            None => {
                self.pool.pause_all();
                None
            }
        };
        info!(position, record = ?record.as_ref().map(|r| r.id.as_str()), outcome = ?outcome, "focus changed");

        self.schedule_preloads(position);
        FocusReport {
            position,
            record,
            outcome,
        }
    }

    /// Activate the session at `position` without moving the focus
    pub async fn activate(&self, position: i64) -> Option<Outcome> {
        let record = self.record_at(position).await?;
        Some(self.pool.activate(position, &record.video_url).await)
    }

    /// Preload the session at `position`
    pub async fn preload(&self, position: i64) -> Option<Outcome> {
        let record = self.record_at(position).await?;
        Some(self.pool.preload(position, &record.video_url).await)
    }

    /// Like `id`; rolls back on a failed confirmation
    pub async fn like(&self, id: &str) -> Result<Option<Record>, reelcache::MutationError> {
        self.mutator.like(id).await
    }

    /// Unlike `id`; rolls back on a failed confirmation
    pub async fn unlike(&self, id: &str) -> Result<Option<Record>, reelcache::MutationError> {
        self.mutator.unlike(id).await
    }

    /// Persist liked flags and release every session
    pub async fn shutdown(&self) -> Result<(), StorageError> {
        let flushed = self.store.flush();
        self.pool.teardown_all().await;
        flushed
    }

    fn schedule_preloads(&self, position: i64) {
        let feed = self.clone();
        let stagger = self.pool.config().preload_stagger;
        let radius = i64::from(self.pool.config().window_radius);

        tokio::spawn(async move {
            for distance in 1..=radius {
                for neighbor in [position + distance, position - distance] {
                    sleep(stagger).await;
                    if feed.pool.focus() != Some(position) {
                        debug!(position, neighbor, "focus moved, preloads dropped");
                        return;
                    }
                    let outcome = feed.preload(neighbor).await;
                    debug!(position, neighbor, outcome = ?outcome, "neighbor preload");
                }
            }
        });
    }
}
