//! Collaborator contracts consumed by the record store
//!
//! The transport client and the key-value store live outside this crate;
//! these traits are the only surface the caches see of them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::Mutex;
use reelstore::ListStore;
use tracing::warn;

use crate::error::{ConfirmError, FetchError, StorageError};
use crate::record::{PageKey, Record, RecordId};

/// Fetches records from the backend
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// One page of a collection, in feed order
    async fn fetch_page(&self, key: &PageKey) -> Result<Vec<Record>, FetchError>;

    /// A single record by id
    async fn fetch_record(&self, id: &str) -> Result<Record, FetchError>;
}

/// Confirms like/unlike mutations with the backend
#[async_trait]
pub trait LikeConfirmer: Send + Sync {
    /// Persist the liked state remotely
    async fn confirm_like(&self, id: &str, liked: bool) -> Result<(), ConfirmError>;
}

/// Confirmer for backends without a like endpoint; always succeeds
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConfirmer;

#[async_trait]
impl LikeConfirmer for NoopConfirmer {
    async fn confirm_like(&self, _id: &str, _liked: bool) -> Result<(), ConfirmError> {
        Ok(())
    }
}

/// Durable home of the liked-id list
pub trait FlagStorage: Send + Sync {
    /// Liked ids saved by a previous session, oldest first
    fn load_flags(&self) -> Vec<RecordId>;

    /// Replace the saved list
    fn save_flags(&self, ids: &[RecordId]) -> Result<(), StorageError>;

    /// Delete the saved list
    fn clear_flags(&self) -> Result<(), StorageError>;
}

/// [`FlagStorage`] backed by one list of a [`ListStore`]
pub struct StoredFlags {
    store: Arc<ListStore>,
    list: String,
}

impl StoredFlags {
    /// Use `list` inside `store`
    pub fn new(store: Arc<ListStore>, list: impl Into<String>) -> Self {
        Self {
            store,
            list: list.into(),
        }
    }
}

impl FlagStorage for StoredFlags {
    fn load_flags(&self) -> Vec<RecordId> {
        self.store.get_list(&self.list).unwrap_or_else(|e| {
            warn!(list = %self.list, error = %e, "could not load liked flags, starting empty");
            Vec::new()
        })
    }

    fn save_flags(&self, ids: &[RecordId]) -> Result<(), StorageError> {
        self.store.set_list(&self.list, ids)?;
        Ok(())
    }

    fn clear_flags(&self) -> Result<(), StorageError> {
        self.store.remove(&self.list)?;
        Ok(())
    }
}

/// In-memory [`FlagStorage`] for ephemeral sessions; counts writes
#[derive(Debug, Default)]
pub struct MemoryFlags {
    ids: Mutex<Vec<RecordId>>,
    saves: AtomicUsize,
}

impl MemoryFlags {
    /// Start with `ids` already saved
    pub fn with_ids<I: IntoIterator<Item = RecordId>>(ids: I) -> Self {
        Self {
            ids: Mutex::new(ids.into_iter().collect()),
            saves: AtomicUsize::new(0),
        }
    }

    /// Currently saved ids
    pub fn saved(&self) -> Vec<RecordId> {
        self.ids.lock().clone()
    }

    /// Number of successful saves so far
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl FlagStorage for MemoryFlags {
    fn load_flags(&self) -> Vec<RecordId> {
        self.saved()
    }

    fn save_flags(&self, ids: &[RecordId]) -> Result<(), StorageError> {
        *self.ids.lock() = ids.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear_flags(&self) -> Result<(), StorageError> {
        self.ids.lock().clear();
        Ok(())
    }
}
