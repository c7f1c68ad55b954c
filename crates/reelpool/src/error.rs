//! Error types for reelpool

use thiserror::Error;

/// Construction-time errors; not recoverable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// A limit or duration is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Failure creating or initializing a session; the position is marked failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreationError {
    /// The factory refused or could not open the source
    #[error("session creation failed: {0}")]
    Failed(String),

    /// Create + init did not finish before the deadline
    #[error("session creation timed out")]
    Timeout,
}

/// Failure of a play or pause call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("session error: {0}")]
pub struct SessionError(pub String);
