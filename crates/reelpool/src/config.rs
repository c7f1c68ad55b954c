//! Pool configuration

use std::time::Duration;

use crate::error::PoolError;

/// Configuration of a [`ResourcePool`](crate::ResourcePool)
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Hard ceiling on Initializing + Ready sessions
    pub max_concurrent: usize,
    /// Positions kept alive on each side of the focus
    pub window_radius: u32,
    /// Deadline covering create + init of one session
    pub init_timeout: Duration,
    /// Wait for a first decoded frame before reporting Ready
    pub first_frame_wait: Duration,
    /// Delay between neighbor preloads after a focus change
    pub preload_stagger: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            window_radius: 1,
            init_timeout: Duration::from_secs(15),
            first_frame_wait: Duration::from_millis(100),
            preload_stagger: Duration::from_millis(300),
        }
    }
}

impl PoolConfig {
    /// Reject values the pool cannot run with
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_concurrent == 0 {
            return Err(PoolError::InvalidConfiguration(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }
        if self.init_timeout.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "init_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of positions in the keep window
    pub fn window_len(&self) -> usize {
        2 * self.window_radius as usize + 1
    }
}
