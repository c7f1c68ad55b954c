//! Record store configuration
//!
//! Capacities and TTLs tuned for a phone-sized feed session:
//! - Records: a few hundred clips scrolled past in one session
//! - Pages: the last couple of collections at typical page sizes
//! - Liked flags: long-lived, trimmed to half when full

use std::time::Duration;

use crate::error::CacheError;

/// Configuration of a [`RecordStore`](crate::RecordStore)
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Maximum cached single records
    pub record_capacity: usize,
    /// Maximum cached pages
    pub page_capacity: usize,
    /// Maximum liked-flag overrides before trimming
    pub liked_capacity: usize,
    /// Overrides kept after a trim
    pub liked_trim_to: usize,
    /// Freshness window for records and pages
    pub ttl: Duration,
    /// Quiet period before liked flags are written durably
    pub persist_debounce: Duration,
    /// Durable list name holding liked ids
    pub liked_list: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            record_capacity: 500,
            page_capacity: 20,
            liked_capacity: 1000,
            liked_trim_to: 500,
            ttl: Duration::from_secs(5 * 60),
            persist_debounce: Duration::from_secs(2),
            liked_list: "liked".to_string(),
        }
    }
}

impl StoreConfig {
    /// Reject values the store cannot run with
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.record_capacity == 0 || self.page_capacity == 0 {
            return Err(CacheError::InvalidConfiguration(
                "record and page capacities must be greater than 0".to_string(),
            ));
        }
        if self.liked_capacity == 0 || self.liked_trim_to == 0 || self.liked_trim_to > self.liked_capacity {
            return Err(CacheError::InvalidConfiguration(format!(
                "liked flags need 0 < trim_to ({}) <= capacity ({})",
                self.liked_trim_to, self.liked_capacity
            )));
        }
        if self.ttl.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "ttl must be non-zero".to_string(),
            ));
        }
        if self.liked_list.is_empty() {
            return Err(CacheError::InvalidConfiguration(
                "liked list name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = StoreConfig {
            record_capacity: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_trim_above_capacity() {
        let config = StoreConfig {
            liked_capacity: 10,
            liked_trim_to: 20,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
