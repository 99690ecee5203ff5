//! Store configuration.
//!
//! All tunables live here and are injected at construction time. There
//! is no ambient global configuration; the CLI builds one `StoreConfig`
//! from flags and hands it down.

use std::time::Duration;

/// Tunable parameters for the store, cache, and sweeper.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Records older than this many days are purged by the sweeper.
    pub retention_days: i64,
    /// Query cache entry lifetime in seconds. Zero disables the cache.
    pub cache_ttl_secs: u64,
    /// Interval between retention sweeps in seconds.
    pub sweep_interval_secs: u64,
    /// Hard ceiling on `limit` for list queries.
    pub max_results_per_page: usize,
    /// Limit applied when a list query does not specify one.
    pub default_page_size: usize,
    /// Attempts for a failing backend operation before surfacing.
    pub retry_attempts: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            cache_ttl_secs: 3600,
            sweep_interval_secs: 3600,
            max_results_per_page: 1000,
            default_page_size: 100,
            retry_attempts: 3,
            retry_base_delay_ms: 50,
        }
    }
}

impl StoreConfig {
    /// Backoff delay before the given retry attempt (0-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms << attempt)
    }

    /// Sweep interval as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Retention horizon as a chrono duration.
    pub fn retention_horizon(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    /// Cache TTL as a chrono duration.
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs as i64)
    }
}
