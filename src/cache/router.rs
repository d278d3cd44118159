//! Invalidation router.
//!
//! Maps a committed content change to the set of cache tags that are now
//! stale and asks the cache backend to evict them. Tag computation depends
//! only on the event and on division identity, so the same event always
//! yields the same tags.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::application::repos::DivisionDirectory;
use crate::domain::entities::EntityId;
use crate::domain::types::Mediable;

use super::backend::CacheBackend;
use super::events::{ChangeEnvelope, ChangeEvent, Subject};
use super::keys::{CacheTag, DivisionRef, TagSet, normalize_identifier};

const METRIC_TAGS_INVALIDATED: &str = "corpsite_cache_tags_invalidated_total";
const METRIC_EVICTION_FAILED: &str = "corpsite_cache_eviction_failed_total";

pub struct InvalidationRouter {
    divisions: Arc<dyn DivisionDirectory>,
    backend: Arc<dyn CacheBackend>,
}

impl InvalidationRouter {
    pub fn new(divisions: Arc<dyn DivisionDirectory>, backend: Arc<dyn CacheBackend>) -> Self {
        Self { divisions, backend }
    }

    /// Compute the stale tags for `event` without evicting anything.
    #[instrument(
        skip(self, event),
        fields(entity_kind = %event.kind(), entity_id = event.entity_id)
    )]
    pub async fn tags_for(&self, event: &ChangeEvent) -> TagSet {
        let mut tags = TagSet::new();

        match &event.subject {
            Subject::Settings => {
                tags.insert(CacheTag::Settings);
            }
            Subject::Client => {
                tags.insert(CacheTag::Clients);
            }
            Subject::Division { slug } => {
                tags.insert(CacheTag::Divisions);
                if let Some(tag) = slug.as_deref().and_then(CacheTag::division) {
                    tags.insert(tag);
                }
            }
            Subject::Product { division_id } => {
                tags.insert(CacheTag::Products);
                if let Some(parent) = self.parent_ref(*division_id).await {
                    tags.insert(CacheTag::ProductsOf(parent));
                }
            }
            Subject::Technology { division_id } => {
                tags.insert(CacheTag::Technologies);
                if let Some(parent) = self.parent_ref(*division_id).await {
                    tags.insert(CacheTag::TechnologiesOf(parent));
                }
            }
            Subject::Machine { division_id } => {
                tags.insert(CacheTag::Machines);
                if let Some(parent) = self.parent_ref(*division_id).await {
                    tags.insert(CacheTag::MachinesOf(parent));
                }
            }
            Subject::Media {
                is_home_slider,
                mediable,
            } => {
                if *is_home_slider {
                    tags.insert(CacheTag::MediaHomeSlider);
                }
                if let Some(Mediable::Division(division_id)) = mediable
                    && let Some(page) = self.media_owner_page(*division_id).await
                {
                    tags.insert(CacheTag::MediaDivision);
                    tags.insert(page);
                }
            }
            Subject::Milestone => {
                tags.insert(CacheTag::Milestones);
            }
        }

        tags
    }

    /// Compute the stale tags for `event` and evict each of them.
    pub async fn invalidate(&self, event: &ChangeEvent) -> TagSet {
        let tags = self.tags_for(event).await;
        self.evict(&tags).await;
        tags
    }

    /// Invalidate from an untyped change; unknown kinds evict nothing.
    pub async fn invalidate_envelope(&self, envelope: &ChangeEnvelope) -> TagSet {
        match envelope.to_event() {
            Some(event) => self.invalidate(&event).await,
            None => TagSet::new(),
        }
    }

    /// Evict every tag once. Backend failures are logged and swallowed; the
    /// entry TTL bounds how long a missed eviction can serve stale data.
    ///
    /// Returns the number of cache entries removed.
    pub async fn evict(&self, tags: &TagSet) -> usize {
        let mut removed = 0;
        for tag in tags {
            match self.backend.evict_tag(tag).await {
                Ok(count) => {
                    removed += count;
                    counter!(METRIC_TAGS_INVALIDATED).increment(1);
                    debug!(tag = %tag, removed = count, "Cache tag evicted");
                }
                Err(err) => {
                    counter!(METRIC_EVICTION_FAILED).increment(1);
                    warn!(
                        tag = %tag,
                        error = %err,
                        "Cache tag eviction failed; entries expire by TTL"
                    );
                }
            }
        }
        removed
    }

    /// Resolve a child's parent division key: slug when the row loads,
    /// otherwise the raw foreign key so the scoped tag is still produced.
    async fn parent_ref(&self, division_id: Option<EntityId>) -> Option<DivisionRef> {
        let division_id = division_id?;

        match self.divisions.find_slug(division_id).await {
            Ok(Some(slug)) => Some(
                normalize_identifier(&slug)
                    .map(DivisionRef::Slug)
                    .unwrap_or(DivisionRef::Id(division_id)),
            ),
            Ok(None) => {
                debug!(division_id, "Parent division missing; using numeric key");
                Some(DivisionRef::Id(division_id))
            }
            Err(err) => {
                warn!(
                    division_id,
                    error = %err,
                    "Parent division lookup failed; using numeric key"
                );
                Some(DivisionRef::Id(division_id))
            }
        }
    }

    /// Page tag of the division owning a media row, when it can be loaded.
    async fn media_owner_page(&self, division_id: EntityId) -> Option<CacheTag> {
        // A missing owner skips the division branch entirely, so a cached
        // `division:<slug>` page can stay stale until its TTL expires.
        match self.divisions.find_slug(division_id).await {
            Ok(Some(slug)) => CacheTag::division(&slug),
            Ok(None) => {
                warn!(
                    division_id,
                    "Media owner division not found; division page may stay stale until TTL"
                );
                None
            }
            Err(err) => {
                warn!(
                    division_id,
                    error = %err,
                    "Media owner lookup failed; division page may stay stale until TTL"
                );
                None
            }
        }
    }
}
