//! Optimistic like/unlike with rollback
//!
//! The local change is visible before the backend answers. If the backend
//! refuses, the flag and the cached record are put back exactly as they were
//! and the durable copy is rewritten immediately.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::MutationError;
use crate::record::Record;
use crate::source::LikeConfirmer;
use crate::store::RecordStore;

/// Applies like mutations locally, then confirms them remotely
#[derive(Clone)]
pub struct OptimisticMutator {
    store: RecordStore,
    confirmer: Arc<dyn LikeConfirmer>,
}

impl OptimisticMutator {
    /// Create a mutator over `store`
    pub fn new(store: RecordStore, confirmer: Arc<dyn LikeConfirmer>) -> Self {
        Self { store, confirmer }
    }

    /// The store mutations are applied to
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Set the liked state of `id`.
    ///
    /// Returns the cached record after the change, or `None` if the record
    /// is not cached. On a failed confirmation the change is rolled back
    /// before the error is returned.
    pub async fn set_liked(&self, id: &str, liked: bool) -> Result<Option<Record>, MutationError> {
        let snapshot = self.store.snapshot(id);
        self.store.apply_like(id, liked);
        debug!(id, liked, "like applied locally");

        match self.confirmer.confirm_like(id, liked).await {
            Ok(()) => {
                self.store.settle(id);
                Ok(self.store.cached_record(id))
            }
            Err(e) => {
                warn!(id, liked, error = %e, "like confirmation failed, rolling back");
                self.store.restore(id, &snapshot);
                if let Err(flush_err) = self.store.flush() {
                    warn!(id, error = %flush_err, "could not persist rolled-back liked flags");
                }
                Err(MutationError::Confirm(e))
            }
        }
    }

    /// Like `id`
    pub async fn like(&self, id: &str) -> Result<Option<Record>, MutationError> {
        self.set_liked(id, true).await
    }

    /// Unlike `id`
    pub async fn unlike(&self, id: &str) -> Result<Option<Record>, MutationError> {
        self.set_liked(id, false).await
    }

    /// Flip the current liked state of `id`
    pub async fn toggle(&self, id: &str) -> Result<Option<Record>, MutationError> {
        let liked = self.store.is_liked(id);
        self.set_liked(id, !liked).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::{ConfirmError, FetchError};
    use crate::record::PageKey;
    use crate::source::{MemoryFlags, NoopConfirmer, RecordSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct OneRecord;

    #[async_trait]
    impl RecordSource for OneRecord {
        async fn fetch_page(&self, _key: &PageKey) -> Result<Vec<Record>, FetchError> {
            Ok(vec![self.fetch_record("clip-1").await?])
        }

        async fn fetch_record(&self, id: &str) -> Result<Record, FetchError> {
            let mut record = Record::new(id, format!("https://cdn/{}.mp4", id));
            record.likes = 5;
            Ok(record)
        }
    }

    #[derive(Default)]
    struct SwitchConfirmer {
        reject: AtomicBool,
    }

    #[async_trait]
    impl LikeConfirmer for SwitchConfirmer {
        async fn confirm_like(&self, _id: &str, _liked: bool) -> Result<(), ConfirmError> {
            if self.reject.load(Ordering::SeqCst) {
                Err(ConfirmError::Fetch(FetchError::Timeout))
            } else {
                Ok(())
            }
        }
    }

    /// Rejects every like, but only after a second
    struct SlowRejecter;

    #[async_trait]
    impl LikeConfirmer for SlowRejecter {
        async fn confirm_like(&self, _id: &str, _liked: bool) -> Result<(), ConfirmError> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Err(ConfirmError::Rejected("not allowed".to_string()))
        }
    }

    fn setup(confirmer: Arc<dyn LikeConfirmer>) -> (OptimisticMutator, Arc<MemoryFlags>) {
        let flags = Arc::new(MemoryFlags::default());
        let store = RecordStore::new(StoreConfig::default(), Arc::new(OneRecord), flags.clone()).unwrap();
        (OptimisticMutator::new(store, confirmer), flags)
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_like_commits() {
        let (mutator, flags) = setup(Arc::new(NoopConfirmer));
        mutator.store().get_record("clip-1", false).await;

        let record = mutator.like("clip-1").await.unwrap().unwrap();

        assert_eq!((record.likes, record.is_liked), (6, true));
        assert!(mutator.store().is_liked("clip-1"));

        mutator.store().flush().unwrap();
        assert_eq!(flags.saved(), vec!["clip-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_restores_record_and_flag_durably() {
        let confirmer = Arc::new(SwitchConfirmer::default());
        confirmer.reject.store(true, Ordering::SeqCst);
        let (mutator, flags) = setup(confirmer);
        let before = mutator.store().get_record("clip-1", false).await.unwrap();
        assert_eq!(before.likes, 5);

        let result = mutator.like("clip-1").await;

        assert!(matches!(result, Err(MutationError::Confirm(_))));
        assert_eq!(mutator.store().cached_record("clip-1"), Some(before));
        assert!(!mutator.store().is_liked("clip-1"));
        assert_eq!(mutator.store().cache_stats().liked.size, 0);

        // Durable copy rewritten synchronously, not after the debounce.
        assert_eq!(flags.saves(), 1);
        assert!(flags.saved().is_empty());
        assert!(!mutator.store().has_pending_writes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_keeps_previous_flag() {
        let confirmer = Arc::new(SwitchConfirmer::default());
        let (mutator, _flags) = setup(confirmer.clone());
        mutator.store().get_record("clip-1", false).await;

        mutator.like("clip-1").await.unwrap();
        confirmer.reject.store(true, Ordering::SeqCst);
        let result = mutator.unlike("clip-1").await;

        assert!(result.is_err());
        let record = mutator.store().cached_record("clip-1").unwrap();
        assert_eq!((record.likes, record.is_liked), (6, true));
        assert!(mutator.store().is_liked("clip-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_undoes_flag_stamped_by_fetch_during_confirm() {
        let (mutator, _flags) = setup(Arc::new(SlowRejecter));
        let store = mutator.store().clone();

        let pending = tokio::spawn({
            let mutator = mutator.clone();
            async move { mutator.like("clip-1").await }
        });
        while !store.is_liked("clip-1") {
            tokio::task::yield_now().await;
        }

        // Fetched while the like is unconfirmed: shows the optimistic flag.
        let fetched = store.get_record("clip-1", false).await.unwrap();
        assert!(fetched.is_liked);
        let key = PageKey::new("for_you", 1, 10);
        assert!(store.get_page(&key, false).await.records[0].is_liked);

        assert!(pending.await.unwrap().is_err());

        assert!(!store.is_liked("clip-1"));
        assert_eq!(store.cached_record("clip-1").map(|r| r.is_liked), Some(false));
        let page = store.get_page(&key, false).await;
        assert_eq!(page.source, crate::record::PageSource::Cache);
        assert!(!page.records[0].is_liked);
        assert_eq!(page.records[0].likes, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_like_survives_later_fetch() {
        let (mutator, _flags) = setup(Arc::new(NoopConfirmer));
        mutator.like("clip-1").await.unwrap();

        let fetched = mutator.store().get_record("clip-1", true).await.unwrap();

        assert!(fetched.is_liked);
        assert!(mutator.store().is_liked("clip-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncached_record_only_sets_flag() {
        let (mutator, _flags) = setup(Arc::new(NoopConfirmer));

        let result = mutator.like("clip-9").await.unwrap();

        assert_eq!(result, None);
        assert!(mutator.store().is_liked("clip-9"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_like_does_not_double_count() {
        let (mutator, _flags) = setup(Arc::new(NoopConfirmer));
        mutator.store().get_record("clip-1", false).await;

        mutator.like("clip-1").await.unwrap();
        let record = mutator.like("clip-1").await.unwrap().unwrap();

        assert_eq!(record.likes, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle() {
        let (mutator, _flags) = setup(Arc::new(NoopConfirmer));
        mutator.store().get_record("clip-1", false).await;

        let liked = mutator.toggle("clip-1").await.unwrap().unwrap();
        let unliked = mutator.toggle("clip-1").await.unwrap().unwrap();

        assert_eq!((liked.likes, liked.is_liked), (6, true));
        assert_eq!((unliked.likes, unliked.is_liked), (5, false));
    }
}
