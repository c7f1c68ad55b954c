//! Debounced durable writes
//!
//! Rapid mutations are coalesced into one write: every mutation marks the
//! state dirty and restarts a single timer task. [`DebouncedWriter::take_pending`]
//! is the only way to claim the dirty bit, so a timer firing and an explicit
//! flush racing each other write at most once for the same batch.
//!
//! Timer-driven writes run on the blocking pool, so file syncs never stall
//! a runtime worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Restartable one-shot timer plus a dirty flag
#[derive(Debug)]
pub struct DebouncedWriter {
    delay: Duration,
    pending: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl DebouncedWriter {
    /// Create with the quiet period that must pass before writing
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: AtomicBool::new(false),
            timer: Mutex::new(None),
        }
    }

    /// Mark dirty without scheduling
    pub fn mark_pending(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Mark dirty and (re)start the timer; `write` runs on the blocking pool
    /// once the delay passes without another call. Outside a tokio runtime
    /// `write` runs immediately on the calling thread.
    pub fn schedule<F>(&self, write: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.mark_pending();

        let mut timer = self.timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        match Handle::try_current() {
            Ok(runtime) => {
                let delay = self.delay;
                *timer = Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = tokio::task::spawn_blocking(write).await {
                        warn!(error = %e, "debounced write panicked");
                    }
                }));
                trace!(delay_ms = delay.as_millis() as u64, "persist scheduled");
            }
            Err(_) => {
                drop(timer);
                write();
            }
        }
    }

    /// Cancel any scheduled write; the dirty flag is left as is
    pub fn cancel(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
            trace!("persist timer cancelled");
        }
    }

    /// Claim the dirty flag; true means the caller must write
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Whether a write is owed
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Configured quiet period
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for DebouncedWriter {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}
