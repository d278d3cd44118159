//! Change consumer.
//!
//! Drains committed changes from the queue, plans the batch and evicts the
//! resulting tags.

use std::sync::Arc;
use std::time::Instant;

use metrics::{gauge, histogram};
use tracing::{info, instrument};
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::{ChangeQueue, QueuedChange};
use super::keys::TagSet;
use super::planner::InvalidationPlan;
use super::router::InvalidationRouter;

const METRIC_CACHE_INVALIDATE_MS: &str = "corpsite_cache_invalidate_ms";
const METRIC_CHANGE_QUEUE_LEN: &str = "corpsite_cache_change_queue_len";

pub struct ChangeConsumer {
    config: CacheConfig,
    queue: Arc<ChangeQueue>,
    router: Arc<InvalidationRouter>,
}

impl ChangeConsumer {
    pub fn new(
        config: CacheConfig,
        queue: Arc<ChangeQueue>,
        router: Arc<InvalidationRouter>,
    ) -> Self {
        Self {
            config,
            queue,
            router,
        }
    }

    /// Consume one batch of pending changes.
    ///
    /// Returns the tags that were evicted; empty when nothing was pending.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> TagSet {
        let changes = self.queue.drain(self.config.batch_limit());
        gauge!(METRIC_CHANGE_QUEUE_LEN).set(self.queue.len() as f64);
        self.apply(changes).await
    }

    /// Consume until the queue is empty, returning the union of evicted tags.
    pub async fn consume_all(&self) -> TagSet {
        let mut evicted = TagSet::new();
        while !self.queue.is_empty() {
            evicted.extend(self.consume().await);
        }
        evicted
    }

    /// Plan and evict a batch of committed changes that never went through the
    /// shared queue.
    pub async fn apply(&self, changes: Vec<QueuedChange>) -> TagSet {
        if changes.is_empty() {
            return TagSet::new();
        }

        let started_at = Instant::now();
        let change_ids: Vec<Uuid> = changes.iter().map(|change| change.id).collect();
        let plan = InvalidationPlan::build(&self.router, changes).await;

        info!(
            change_count = change_ids.len(),
            change_ids = ?change_ids,
            plan = %plan,
            "Cache invalidation starting"
        );

        let removed = self.router.evict(&plan.tags).await;

        info!(
            tags = plan.tags.len(),
            entries_removed = removed,
            "Cache invalidation complete"
        );
        histogram!(METRIC_CACHE_INVALIDATE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        plan.tags
    }

    pub fn queue(&self) -> &Arc<ChangeQueue> {
        &self.queue
    }

    pub fn router(&self) -> &Arc<InvalidationRouter> {
        &self.router
    }
}
