//! Invalidation plan generation.
//!
//! Merges a batch of queued changes into one deduplicated tag set so each
//! stale tag is evicted once per batch.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::domain::types::EntityKind;

use super::events::{ChangeEvent, QueuedChange};
use super::keys::TagSet;
use super::router::InvalidationRouter;

#[derive(Debug, Default)]
pub struct InvalidationPlan {
    /// Distinct changes folded into the plan.
    pub changes: usize,
    /// Entity kinds touched by the batch.
    pub kinds: BTreeSet<EntityKind>,
    /// Tags to evict.
    pub tags: TagSet,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.kinds.iter().map(|kind| kind.as_str()).collect();
        write!(
            f,
            "InvalidationPlan {{ changes: {}, kinds: [{}], tags: {} }}",
            self.changes,
            kinds.join(", "),
            self.tags.len(),
        )
    }
}

impl InvalidationPlan {
    /// Build a plan from queued changes.
    ///
    /// - Deduplicates by change id
    /// - Resolves tags once per distinct event
    pub async fn build(router: &InvalidationRouter, changes: Vec<QueuedChange>) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();
        let mut seen_events: HashSet<ChangeEvent> = HashSet::new();

        for change in changes {
            if !seen_ids.insert(change.id) {
                continue;
            }
            plan.changes += 1;
            plan.kinds.insert(change.event.kind());

            // Identical events always map to identical tags.
            if !seen_events.insert(change.event.clone()) {
                continue;
            }
            let tags = router.tags_for(&change.event).await;
            plan.tags.extend(tags);
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::events::{ChangeOperation, Subject};
    use crate::cache::keys::CacheTag;
    use crate::cache::store::TagCache;
    use crate::infra::memory::StaticDivisions;

    fn router() -> InvalidationRouter {
        let divisions = StaticDivisions::from_pairs([(7, "acme")]);
        let backend: TagCache<String> = TagCache::new(&CacheConfig::default());
        InvalidationRouter::new(Arc::new(divisions), Arc::new(backend))
    }

    fn queued(entity_id: i64, subject: Subject, epoch: u64) -> QueuedChange {
        QueuedChange::new(
            ChangeEvent::new(entity_id, ChangeOperation::Updated, subject),
            epoch,
        )
    }

    #[tokio::test]
    async fn merges_tags_across_changes() {
        let changes = vec![
            queued(1, Subject::Client, 0),
            queued(
                2,
                Subject::Product {
                    division_id: Some(7),
                },
                1,
            ),
        ];
        let plan = InvalidationPlan::build(&router(), changes).await;

        assert_eq!(plan.changes, 2);
        assert!(plan.tags.contains(&CacheTag::Clients));
        assert!(plan.tags.contains(&CacheTag::Products));
        assert_eq!(plan.tags.len(), 3);
        assert_eq!(
            plan.kinds.iter().copied().collect::<Vec<_>>(),
            vec![EntityKind::Client, EntityKind::Product]
        );
    }

    #[tokio::test]
    async fn dedupes_by_change_id() {
        let change = queued(1, Subject::Milestone, 0);
        let plan = InvalidationPlan::build(&router(), vec![change.clone(), change]).await;

        assert_eq!(plan.changes, 1);
        assert_eq!(plan.tags.len(), 1);
    }

    #[tokio::test]
    async fn overlapping_changes_share_tags() {
        let changes = vec![
            queued(
                1,
                Subject::Division {
                    slug: Some("acme".into()),
                },
                0,
            ),
            queued(
                2,
                Subject::Division {
                    slug: Some("beta".into()),
                },
                1,
            ),
        ];
        let plan = InvalidationPlan::build(&router(), changes).await;

        let names: Vec<String> = plan.tags.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["divisions", "division:acme", "division:beta"]);
    }

    #[tokio::test]
    async fn display_format() {
        let plan = InvalidationPlan::build(&router(), vec![queued(1, Subject::Settings, 0)]).await;
        let display = plan.to_string();
        assert!(display.contains("changes: 1"));
        assert!(display.contains("kinds: [settings]"));
    }

    #[test]
    fn default_plan_is_empty() {
        assert!(InvalidationPlan::default().is_empty());
    }
}
