//! Local record backend read from a JSON catalog
//!
//! Stands in for the remote feed API: serves pages and records, confirms
//! likes, and can be switched into an outage to exercise degraded reads
//! and like rollback.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reelcache::{ConfirmError, FetchError, LikeConfirmer, PageKey, Record, RecordSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Collection served when the catalog names none
pub const DEFAULT_COLLECTION: &str = "for_you";

/// On-disk catalog layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Every record, in default feed order
    pub records: Vec<Record>,
    /// Collection name → record ids in feed order
    #[serde(default)]
    pub collections: HashMap<String, Vec<String>>,
}

impl Catalog {
    /// Read a catalog file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        let catalog: Catalog = serde_json::from_str(&raw)
            .with_context(|| format!("parsing catalog {}", path.display()))?;
        info!(records = catalog.records.len(), collections = catalog.collections.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Synthetic catalog of `count` clips; every seventh one has a source
    /// the simulated player cannot open
    pub fn demo(count: usize) -> Self {
        let records = (0..count)
            .map(|n| {
                let id = format!("clip-{}", n);
                let url = if n % 7 == 6 {
                    format!("broken:https://cdn.example/{}.mp4", id)
                } else {
                    format!("https://cdn.example/{}.mp4", id)
                };
                let mut record = Record::new(id, url);
                record.title = format!("Clip #{}", n);
                record.likes = (n as u64 * 37) % 1000;
                record
            })
            .collect();

        Self {
            records,
            collections: HashMap::new(),
        }
    }
}

/// [`RecordSource`] and [`LikeConfirmer`] over an in-memory [`Catalog`]
pub struct CatalogSource {
    records: Mutex<HashMap<String, Record>>,
    order: Vec<String>,
    collections: HashMap<String, Vec<String>>,
    latency: Duration,
    outage: AtomicBool,
}

impl CatalogSource {
    /// Serve `catalog`, answering every request after `latency`
    pub fn new(catalog: Catalog, latency: Duration) -> Self {
        let order = catalog.records.iter().map(|r| r.id.clone()).collect();
        let records = catalog
            .records
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        Self {
            records: Mutex::new(records),
            order,
            collections: catalog.collections,
            latency,
            outage: AtomicBool::new(false),
        }
    }

    /// Fail every request until switched off again
    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::SeqCst);
        info!(outage, "catalog outage toggled");
    }

    /// Whether requests currently fail
    pub fn in_outage(&self) -> bool {
        self.outage.load(Ordering::SeqCst)
    }

    /// Number of records served
    pub fn len(&self) -> usize {
        self.order.len()
    }

    async fn reachable(&self) -> Result<(), FetchError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.in_outage() {
            return Err(FetchError::Network("catalog unreachable".to_string()));
        }
        Ok(())
    }

    fn ids_of(&self, collection: &str) -> Result<&[String], FetchError> {
        match self.collections.get(collection) {
            Some(ids) => Ok(ids.as_slice()),
            None if collection == DEFAULT_COLLECTION => Ok(self.order.as_slice()),
            None => Err(FetchError::NotFound(format!("collection {}", collection))),
        }
    }
}

#[async_trait]
impl RecordSource for CatalogSource {
    async fn fetch_page(&self, key: &PageKey) -> Result<Vec<Record>, FetchError> {
        self.reachable().await?;

        let ids = self.ids_of(&key.collection)?;
        let records = self.records.lock();
        let page: Vec<Record> = ids
            .iter()
            .skip(key.offset())
            .take(key.page_size as usize)
            .filter_map(|id| records.get(id).cloned())
            .collect();

        debug!(collection = %key.collection, page = key.page, count = page.len(), "catalog page served");
        Ok(page)
    }

    async fn fetch_record(&self, id: &str) -> Result<Record, FetchError> {
        self.reachable().await?;

        self.records
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl LikeConfirmer for CatalogSource {
    async fn confirm_like(&self, id: &str, liked: bool) -> Result<(), ConfirmError> {
        self.reachable().await?;

        let mut records = self.records.lock();
        let record = records
            .get_mut(id)
            .ok_or_else(|| ConfirmError::Rejected(format!("unknown record {}", id)))?;

        if record.is_liked != liked {
            record.is_liked = liked;
            record.likes = if liked {
                record.likes.saturating_add(1)
            } else {
                record.likes.saturating_sub(1)
            };
        }
        Ok(())
    }
}
