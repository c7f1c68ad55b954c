//! # reelcache
//!
//! Record caching layer for the reelkit feed.
//!
//! ## Architecture
//! - **BoundedCache**: AHash index over a slab-backed doubly linked list, O(1) LRU
//! - **TimedCache**: BoundedCache plus per-key write timestamps and one TTL
//! - **RecordStore**: record cache, page cache and liked flags; reads degrade
//!   to cached data instead of failing
//! - **LikedFlags**: insertion-ordered overrides persisted through a
//!   debounced writer into a [`reelstore::ListStore`]
//! - **OptimisticMutator**: local like, remote confirm, rollback on failure
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use reelcache::{MemoryFlags, PageKey, RecordStore, StoreConfig};
//! # use reelcache::{FetchError, Record, RecordSource};
//! # struct Backend;
//! # #[async_trait::async_trait]
//! # impl RecordSource for Backend {
//! #     async fn fetch_page(&self, _: &PageKey) -> Result<Vec<Record>, FetchError> { Ok(vec![]) }
//! #     async fn fetch_record(&self, id: &str) -> Result<Record, FetchError> { Err(FetchError::NotFound(id.into())) }
//! # }
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RecordStore::new(StoreConfig::default(), Arc::new(Backend), Arc::new(MemoryFlags::default()))?;
//! let page = store.get_page(&PageKey::new("for_you", 1, 10), false).await;
//! println!("{} records from {:?}", page.len(), page.source);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod clock;
mod config;
mod error;
mod liked;
mod lru;
mod mutator;
mod persist;
mod record;
mod source;
mod stats;
mod store;
mod timed;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StoreConfig;
pub use error::{CacheError, ConfirmError, FetchError, MutationError, StorageError};
pub use liked::LikedFlags;
pub use lru::BoundedCache;
pub use mutator::OptimisticMutator;
pub use persist::DebouncedWriter;
pub use record::{Page, PageKey, PageSource, Record, RecordId};
pub use source::{FlagStorage, LikeConfirmer, MemoryFlags, NoopConfirmer, RecordSource, StoredFlags};
pub use stats::{CacheStats, Occupancy, StoreStats};
pub use store::RecordStore;
pub use timed::TimedCache;
