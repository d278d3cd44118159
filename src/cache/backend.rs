//! Eviction seam between the router and whatever holds cached entries.

use async_trait::async_trait;
use thiserror::Error;

use super::keys::CacheTag;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// A store that can drop every entry filed under a tag.
///
/// Evicting a tag with no entries is `Ok(0)`; evicting twice is the same as
/// evicting once.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns the number of entries removed.
    async fn evict_tag(&self, tag: &CacheTag) -> Result<usize, CacheError>;
}
