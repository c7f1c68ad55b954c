//! # reelpool
//!
//! Bounded pool of expensive, asynchronously initialized playback sessions,
//! one per visible feed position.
//!
//! ## Architecture
//! - **Keep window**: `focus ± radius`; sessions outside it are paused and
//!   destroyed before anything new is created
//! - **Admission**: `max_concurrent` caps Initializing + Ready sessions
//! - **Creation**: spawned task under one create + init deadline, guarded so
//!   cancellation cannot leave a position stuck
//! - **Failure memory**: a position that failed is never retried until
//!   `teardown_all`
//!
//! ## Example
//! ```no_run
//! # use reelpool::{PoolConfig, ResourcePool, SessionFactory};
//! # async fn run<F: SessionFactory>(factory: F) -> Result<(), reelpool::PoolError> {
//! let pool = ResourcePool::new(factory, PoolConfig::default())?;
//! pool.set_focus(5).await;
//! pool.activate(5, "https://cdn/5.mp4").await;
//! pool.preload(6, "https://cdn/6.mp4").await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod guard;
mod pool;
mod session;
mod state;
mod stats;

pub use config::PoolConfig;
pub use error::{CreationError, PoolError, SessionError};
pub use pool::ResourcePool;
pub use session::{Outcome, SessionFactory, SessionState, SkipReason};
pub use stats::PoolStats;
