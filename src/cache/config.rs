//! Cache configuration.
//!
//! Controls the tagged entry cache and the change consumer via `corpsite.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECS: u64 = 3600;
const DEFAULT_CAPACITY: usize = 1000;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch; when off, changes are neither queued nor evicted.
    pub enabled: bool,
    /// Lifetime of an entry regardless of invalidation, in seconds.
    pub default_ttl_secs: u64,
    /// Maximum number of entries before LRU eviction.
    pub capacity: usize,
    /// Maximum changes drained per consumption.
    pub consume_batch_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_secs: DEFAULT_TTL_SECS,
            capacity: DEFAULT_CAPACITY,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            default_ttl_secs: settings.default_ttl.as_secs(),
            capacity: settings.capacity.get(),
            consume_batch_limit: settings.consume_batch_limit.get(),
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Batch limit, clamping to 1 so a consumption always makes progress.
    pub fn batch_limit(&self) -> usize {
        self.consume_batch_limit.max(1)
    }
}
