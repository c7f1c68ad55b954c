//! Feed records and page keys

use serde::{Deserialize, Serialize};

/// Stable record identifier
pub type RecordId = String;

/// A feed item (one short video) with its mutable engagement fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier
    pub id: RecordId,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Playback location handed to the session factory
    pub video_url: String,
    /// Denormalized like counter
    #[serde(default)]
    pub likes: u64,
    /// Whether the current user likes this record
    #[serde(default)]
    pub is_liked: bool,
}

impl Record {
    /// Record with no engagement
    pub fn new(id: impl Into<RecordId>, video_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            video_url: video_url.into(),
            likes: 0,
            is_liked: false,
        }
    }

    /// Move the like counter with the flag; the counter never goes below zero
    pub(crate) fn apply_like(&mut self, liked: bool) {
        if liked == self.is_liked {
            return;
        }
        self.is_liked = liked;
        self.likes = if liked {
            self.likes.saturating_add(1)
        } else {
            self.likes.saturating_sub(1)
        };
    }
}

/// Composite key of one page query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageKey {
    /// Collection selector, e.g. `"for_you"`
    pub collection: String,
    /// 1-based page number
    pub page: u32,
    /// Records per page
    pub page_size: u32,
}

impl PageKey {
    /// Build a key; page 0 is treated as page 1 and page size 0 as 1
    pub fn new(collection: impl Into<String>, page: u32, page_size: u32) -> Self {
        Self {
            collection: collection.into(),
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Index of the first record of this page in a flat listing
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }
}

/// Where a page result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    /// Fresh page cache hit, no network
    Cache,
    /// Fetched from the record source just now
    Network,
    /// Fetch failed; previously cached page served past its TTL
    Stale,
    /// Fetch failed; page assembled from individually cached records
    Synthesized,
    /// Fetch failed and nothing was cached
    Empty,
}

/// One page of records and its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Records in feed order
    pub records: Vec<Record>,
    /// Provenance of `records`
    pub source: PageSource,
}

impl Page {
    /// True when the records were not confirmed by the source just now
    /// and are not a fresh cache hit
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.source,
            PageSource::Stale | PageSource::Synthesized | PageSource::Empty
        )
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the page holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
