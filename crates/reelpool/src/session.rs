//! Playback session contract and per-position state

use std::fmt;
use async_trait::async_trait;

use crate::error::{CreationError, SessionError};

/// Creates, drives and destroys playback sessions.
///
/// `play` and `pause` are synchronous so the pool can switch the active
/// session without yielding.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    /// Opaque session handle
    type Handle: Send + 'static;

    /// Open a session for `source` (url or path)
    async fn create(&self, source: &str) -> Result<Self::Handle, CreationError>;

    /// Prepare a created session for playback
    async fn init(&self, handle: &mut Self::Handle) -> Result<(), CreationError>;

    /// Release a session; best effort, never fails from the caller's view
    async fn destroy(&self, handle: Self::Handle);

    /// Start or resume playback
    fn play(&self, handle: &Self::Handle) -> Result<(), SessionError>;

    /// Pause playback
    fn pause(&self, handle: &Self::Handle) -> Result<(), SessionError>;
}

/// Lifecycle state of one feed position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session and no creation in flight
    Uninitialized,
    /// Creation in flight
    Initializing,
    /// Session usable
    Ready {
        /// Whether this is the active session
        playing: bool,
    },
    /// Creation failed; never retried for the pool's lifetime
    Failed,
}

impl SessionState {
    /// Short uppercase name used in logs and on the control surface
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "UNINITIALIZED",
            SessionState::Initializing => "INITIALIZING",
            SessionState::Ready { playing: true } => "PLAYING",
            SessionState::Ready { playing: false } => "PAUSED",
            SessionState::Failed => "FAILED",
        }
    }
}

/// Why an activate or preload did not start or finish a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No focus has been set yet
    NoFocus,
    /// Position is outside the keep window (or negative)
    OutsideWindow,
    /// `max_concurrent` sessions are already live
    AtCapacity,
    /// Position was torn down while its session was being created
    Superseded,
}

/// Result of [`activate`](crate::ResourcePool::activate) and
/// [`preload`](crate::ResourcePool::preload)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Session is Ready and playing
    Playing,
    /// Session is Ready and paused
    Ready,
    /// Another call is already creating this position
    Pending,
    /// Position is failed (now or earlier)
    Failed,
    /// Nothing was created
    Skipped(SkipReason),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Playing => f.write_str("PLAYING"),
            Outcome::Ready => f.write_str("READY"),
            Outcome::Pending => f.write_str("PENDING"),
            Outcome::Failed => f.write_str("FAILED"),
            Outcome::Skipped(SkipReason::NoFocus) => f.write_str("SKIPPED no_focus"),
            Outcome::Skipped(SkipReason::OutsideWindow) => f.write_str("SKIPPED outside_window"),
            Outcome::Skipped(SkipReason::AtCapacity) => f.write_str("SKIPPED at_capacity"),
            Outcome::Skipped(SkipReason::Superseded) => f.write_str("SKIPPED superseded"),
        }
    }
}
