//! Cache trigger service.
//!
//! The call sites persistence code uses after a committed write. Each method
//! snapshots the record and evicts the tags of that one change right away.
//! Writes batched inside a transaction collect their changes in a
//! [`UnitOfWork`], which evicts on [`UnitOfWork::commit`] and forgets them on
//! [`UnitOfWork::rollback`]. Pending changes of one unit are never visible to
//! another unit or to the immediate call sites.
//!
//! ```ignore
//! // After the division row is committed:
//! trigger.division_changed(&division, ChangeOperation::Updated).await;
//!
//! let mut unit = trigger.begin();
//! unit.defer(ChangeEvent::product(&product, ChangeOperation::Created));
//! tx.commit().await?;
//! unit.commit().await;
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::entities::{
    ClientRecord, DivisionRecord, MachineRecord, MediaRecord, MilestoneRecord, ProductRecord,
    SettingsRecord, TechnologyRecord,
};

use super::config::CacheConfig;
use super::consumer::ChangeConsumer;
use super::events::{ChangeEvent, ChangeOperation, QueuedChange};
use super::keys::TagSet;

pub struct CacheTrigger {
    config: CacheConfig,
    consumer: Arc<ChangeConsumer>,
}

impl CacheTrigger {
    pub fn new(config: CacheConfig, consumer: Arc<ChangeConsumer>) -> Self {
        Self { config, consumer }
    }

    /// Publish a committed change.
    ///
    /// With `consume_now` only this change is evicted, right away; otherwise it
    /// joins the shared queue for a later [`ChangeConsumer::consume`]. Returns
    /// the evicted tags (empty when queued or disabled).
    pub async fn publish(&self, event: ChangeEvent, consume_now: bool) -> TagSet {
        if !self.config.is_enabled() {
            debug!(entity_kind = %event.kind(), "Cache trigger skipped: cache disabled");
            return TagSet::new();
        }

        if consume_now {
            let epoch = self.consumer.queue().next_epoch();
            self.consumer
                .apply(vec![QueuedChange::new(event, epoch)])
                .await
        } else {
            self.consumer.queue().publish(event);
            TagSet::new()
        }
    }

    /// Start collecting the changes of one transaction.
    pub fn begin(&self) -> UnitOfWork<'_> {
        UnitOfWork {
            trigger: self,
            pending: Vec::new(),
        }
    }

    pub async fn settings_saved(&self, record: &SettingsRecord) -> TagSet {
        debug!(keys = record.values.len(), "Settings saved");
        self.publish(ChangeEvent::settings(ChangeOperation::Updated), true)
            .await
    }

    pub async fn client_changed(&self, record: &ClientRecord, op: ChangeOperation) -> TagSet {
        self.publish(ChangeEvent::client(record, op), true).await
    }

    pub async fn division_changed(&self, record: &DivisionRecord, op: ChangeOperation) -> TagSet {
        self.publish(ChangeEvent::division(record, op), true).await
    }

    pub async fn product_changed(&self, record: &ProductRecord, op: ChangeOperation) -> TagSet {
        self.publish(ChangeEvent::product(record, op), true).await
    }

    pub async fn technology_changed(
        &self,
        record: &TechnologyRecord,
        op: ChangeOperation,
    ) -> TagSet {
        self.publish(ChangeEvent::technology(record, op), true).await
    }

    pub async fn machine_changed(&self, record: &MachineRecord, op: ChangeOperation) -> TagSet {
        self.publish(ChangeEvent::machine(record, op), true).await
    }

    pub async fn media_changed(&self, record: &MediaRecord, op: ChangeOperation) -> TagSet {
        self.publish(ChangeEvent::media(record, op), true).await
    }

    pub async fn milestone_changed(&self, record: &MilestoneRecord, op: ChangeOperation) -> TagSet {
        self.publish(ChangeEvent::milestone(record, op), true).await
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn consumer(&self) -> &Arc<ChangeConsumer> {
        &self.consumer
    }
}

/// Changes written inside one uncommitted transaction.
///
/// Dropping a unit without calling [`UnitOfWork::commit`] discards its
/// changes like a rollback.
pub struct UnitOfWork<'a> {
    trigger: &'a CacheTrigger,
    pending: Vec<ChangeEvent>,
}

impl UnitOfWork<'_> {
    pub fn defer(&mut self, event: ChangeEvent) {
        self.pending.push(event);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The transaction committed: evict everything this unit touched.
    pub async fn commit(mut self) -> TagSet {
        let pending = std::mem::take(&mut self.pending);
        if !self.trigger.config.is_enabled() {
            debug!(changes = pending.len(), "Unit of work committed: cache disabled");
            return TagSet::new();
        }

        let queue = self.trigger.consumer.queue();
        let changes = pending
            .into_iter()
            .map(|event| QueuedChange::new(event, queue.next_epoch()))
            .collect();
        self.trigger.consumer.apply(changes).await
    }

    /// The transaction rolled back: forget this unit's changes.
    pub fn rollback(mut self) -> usize {
        let dropped = std::mem::take(&mut self.pending).len();
        if dropped > 0 {
            debug!(dropped, "Unit of work rolled back; pending changes discarded");
        }
        dropped
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                dropped = self.pending.len(),
                "Unit of work dropped without commit; pending changes discarded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::events::{ChangeQueue, Subject};
    use crate::cache::keys::CacheTag;
    use crate::cache::router::InvalidationRouter;
    use crate::cache::store::TagCache;
    use crate::domain::types::Mediable;
    use crate::infra::memory::StaticDivisions;

    fn create_trigger(config: CacheConfig) -> (CacheTrigger, Arc<TagCache<String>>) {
        let cache: Arc<TagCache<String>> = Arc::new(TagCache::new(&config));
        let router = Arc::new(InvalidationRouter::new(
            Arc::new(StaticDivisions::from_pairs([(7, "acme")])),
            cache.clone(),
        ));
        let consumer = Arc::new(ChangeConsumer::new(
            config.clone(),
            Arc::new(ChangeQueue::new()),
            router,
        ));
        (CacheTrigger::new(config, consumer), cache)
    }

    const HOUR: Duration = Duration::from_secs(3600);

    fn product() -> ProductRecord {
        ProductRecord {
            id: 11,
            division_id: 7,
            name: "Booster".to_string(),
        }
    }

    #[tokio::test]
    async fn unit_of_work_evicts_only_on_commit() {
        let (trigger, cache) = create_trigger(CacheConfig::default());
        cache
            .tagged(&[CacheTag::Products])
            .put("products:index", "old".to_string(), HOUR);

        let mut unit = trigger.begin();
        unit.defer(ChangeEvent::product(&product(), ChangeOperation::Created));
        assert_eq!(unit.len(), 1);
        assert!(trigger.consumer().queue().is_empty());
        assert!(cache.get("products:index").is_some());

        let tags = unit.commit().await;
        assert!(tags.contains(&CacheTag::Products));
        assert!(cache.get("products:index").is_none());
    }

    #[tokio::test]
    async fn rollback_discards_only_its_own_changes() {
        let (trigger, cache) = create_trigger(CacheConfig::default());
        cache
            .tagged(&[CacheTag::Clients])
            .put("clients", "logos".to_string(), HOUR);

        let mut rolled_back = trigger.begin();
        rolled_back.defer(ChangeEvent::new(1, ChangeOperation::Updated, Subject::Milestone));
        let mut committed = trigger.begin();
        committed.defer(ChangeEvent::new(2, ChangeOperation::Updated, Subject::Client));

        assert_eq!(rolled_back.rollback(), 1);
        let tags = committed.commit().await;

        assert!(tags.contains(&CacheTag::Clients));
        assert!(cache.get("clients").is_none());
    }

    #[tokio::test]
    async fn dropped_unit_evicts_nothing() {
        let (trigger, cache) = create_trigger(CacheConfig::default());
        cache
            .tagged(&[CacheTag::Milestones])
            .put("about:history", "timeline".to_string(), HOUR);

        {
            let mut unit = trigger.begin();
            unit.defer(ChangeEvent::new(1, ChangeOperation::Deleted, Subject::Milestone));
        }
        assert!(cache.get("about:history").is_some());
    }

    #[tokio::test]
    async fn publish_without_consuming_waits_in_the_queue() {
        let (trigger, cache) = create_trigger(CacheConfig::default());
        cache
            .tagged(&[CacheTag::Milestones])
            .put("about:history", "timeline".to_string(), HOUR);

        let event = ChangeEvent::new(1, ChangeOperation::Updated, Subject::Milestone);
        assert!(trigger.publish(event, false).await.is_empty());
        assert_eq!(trigger.consumer().queue().len(), 1);
        assert!(cache.get("about:history").is_some());

        trigger.consumer().consume_all().await;
        assert!(cache.get("about:history").is_none());
    }

    #[tokio::test]
    async fn trigger_respects_disabled_config() {
        let (trigger, _) = create_trigger(CacheConfig {
            enabled: false,
            ..Default::default()
        });

        let tags = trigger.settings_saved(&SettingsRecord::default()).await;
        assert!(tags.is_empty());
        assert!(trigger.consumer().queue().is_empty());
    }

    #[tokio::test]
    async fn call_sites_consume_immediately() {
        let (trigger, _) = create_trigger(CacheConfig::default());

        let media = MediaRecord {
            id: 3,
            mediable: Mediable::Division(7),
            path: "media/acme/hero.webp".to_string(),
            is_home_slider: false,
            sort_order: 0,
        };
        let tags = trigger.media_changed(&media, ChangeOperation::Deleted).await;

        assert!(tags.contains(&CacheTag::MediaDivision));
        assert!(tags.contains(&CacheTag::Division("acme".to_string())));
        assert!(trigger.consumer().queue().is_empty());
    }
}
