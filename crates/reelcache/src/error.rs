//! Error types for reelcache

use thiserror::Error;

/// Construction-time errors; not recoverable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// A capacity, duration or ratio is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Failure of the record source; read paths degrade to cached data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport-level failure (offline, DNS, reset)
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete in time
    #[error("request timed out")]
    Timeout,

    /// The backend answered with an error status
    #[error("server error {status}: {message}")]
    Server {
        /// Status code reported by the backend
        status: u16,
        /// Backend message
        message: String,
    },

    /// The requested record does not exist
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Failure of the remote like confirmation; triggers rollback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmError {
    /// The backend refused the mutation
    #[error("like rejected: {0}")]
    Rejected(String),

    /// The confirmation request could not be delivered
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Failure writing the durable liked-flag copy
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error from the list storage engine
    #[error(transparent)]
    Store(#[from] reelstore::Error),

    /// Error from any other backing store
    #[error("storage error: {0}")]
    Backend(String),
}

/// Error surfaced by an optimistic mutation after it has rolled back
#[derive(Debug, Error)]
pub enum MutationError {
    /// Remote confirmation failed; local state was restored
    #[error("like confirmation failed, change rolled back: {0}")]
    Confirm(#[from] ConfirmError),
}
