//! Simulated video player
//!
//! Opening a source takes a configurable startup latency. Sources prefixed
//! with `broken:` open but fail to initialize, and sources prefixed with
//! `stall:` never finish initializing, so the pool's failure and timeout
//! paths can be driven from a catalog.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use reelpool::{CreationError, SessionError, SessionFactory};
use tracing::{debug, trace};

/// Handle to one simulated decoder
#[derive(Debug)]
pub struct PlayerHandle {
    id: u64,
    source: String,
}

/// [`SessionFactory`] producing simulated decoders
#[derive(Debug, Default)]
pub struct SimulatedPlayer {
    startup: Duration,
    next_id: AtomicU64,
    open: AtomicUsize,
    opened_total: AtomicU64,
}

impl SimulatedPlayer {
    /// Player whose sessions take `startup` to open
    pub fn new(startup: Duration) -> Self {
        Self {
            startup,
            ..Self::default()
        }
    }

    /// Decoders currently open
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Decoders opened since start
    pub fn opened_total(&self) -> u64 {
        self.opened_total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for SimulatedPlayer {
    type Handle = PlayerHandle;

    async fn create(&self, source: &str) -> Result<PlayerHandle, CreationError> {
        if source.is_empty() {
            return Err(CreationError::Failed("empty source".to_string()));
        }
        tokio::time::sleep(self.startup).await;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.open.fetch_add(1, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);
        debug!(id, source, "decoder opened");
        Ok(PlayerHandle {
            id,
            source: source.to_string(),
        })
    }

    async fn init(&self, handle: &mut PlayerHandle) -> Result<(), CreationError> {
        if handle.source.starts_with("broken:") {
            return Err(CreationError::Failed(format!("cannot decode {}", handle.source)));
        }
        if handle.source.starts_with("stall:") {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn destroy(&self, handle: PlayerHandle) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        debug!(id = handle.id, source = %handle.source, "decoder closed");
    }

    fn play(&self, handle: &PlayerHandle) -> Result<(), SessionError> {
        trace!(id = handle.id, "play");
        Ok(())
    }

    fn pause(&self, handle: &PlayerHandle) -> Result<(), SessionError> {
        trace!(id = handle.id, "pause");
        Ok(())
    }
}
