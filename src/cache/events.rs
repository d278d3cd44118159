//! Change events and the pending-change queue.
//!
//! A [`ChangeEvent`] is built from a record right after a successful write and
//! carries only the fields invalidation needs. Committed changes that are not
//! evicted right away wait in a [`ChangeQueue`] until a consumer drains it.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::entities::{
    ClientRecord, DivisionRecord, EntityId, MachineRecord, MediaRecord, MilestoneRecord,
    ProductRecord, SettingsRecord, TechnologyRecord,
};
use crate::domain::types::{EntityKind, Mediable};

use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";

/// Monotonic epoch for ordering queued changes within this process.
pub type Epoch = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Created,
    Updated,
    Deleted,
}

/// Per-kind snapshot of the attributes invalidation depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Settings,
    Client,
    Division {
        slug: Option<String>,
    },
    Product {
        division_id: Option<EntityId>,
    },
    Technology {
        division_id: Option<EntityId>,
    },
    Machine {
        division_id: Option<EntityId>,
    },
    Media {
        is_home_slider: bool,
        mediable: Option<Mediable>,
    },
    Milestone,
}

impl Subject {
    pub fn kind(&self) -> EntityKind {
        match self {
            Subject::Settings => EntityKind::Settings,
            Subject::Client => EntityKind::Client,
            Subject::Division { .. } => EntityKind::Division,
            Subject::Product { .. } => EntityKind::Product,
            Subject::Technology { .. } => EntityKind::Technology,
            Subject::Machine { .. } => EntityKind::Machine,
            Subject::Media { .. } => EntityKind::Media,
            Subject::Milestone => EntityKind::Milestone,
        }
    }
}

/// A committed mutation of one content record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    pub entity_id: EntityId,
    pub operation: ChangeOperation,
    pub subject: Subject,
}

impl ChangeEvent {
    pub fn new(entity_id: EntityId, operation: ChangeOperation, subject: Subject) -> Self {
        Self {
            entity_id,
            operation,
            subject,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.subject.kind()
    }

    pub fn settings(operation: ChangeOperation) -> Self {
        Self::new(SettingsRecord::SINGLETON_ID, operation, Subject::Settings)
    }

    pub fn client(record: &ClientRecord, operation: ChangeOperation) -> Self {
        Self::new(record.id, operation, Subject::Client)
    }

    pub fn division(record: &DivisionRecord, operation: ChangeOperation) -> Self {
        Self::new(
            record.id,
            operation,
            Subject::Division {
                slug: Some(record.slug.clone()),
            },
        )
    }

    pub fn product(record: &ProductRecord, operation: ChangeOperation) -> Self {
        Self::new(
            record.id,
            operation,
            Subject::Product {
                division_id: Some(record.division_id),
            },
        )
    }

    pub fn technology(record: &TechnologyRecord, operation: ChangeOperation) -> Self {
        Self::new(
            record.id,
            operation,
            Subject::Technology {
                division_id: Some(record.division_id),
            },
        )
    }

    pub fn machine(record: &MachineRecord, operation: ChangeOperation) -> Self {
        Self::new(
            record.id,
            operation,
            Subject::Machine {
                division_id: Some(record.division_id),
            },
        )
    }

    pub fn media(record: &MediaRecord, operation: ChangeOperation) -> Self {
        Self::new(
            record.id,
            operation,
            Subject::Media {
                is_home_slider: record.is_home_slider,
                mediable: Some(record.mediable),
            },
        )
    }

    pub fn milestone(record: &MilestoneRecord, operation: ChangeOperation) -> Self {
        Self::new(record.id, operation, Subject::Milestone)
    }
}

/// Untyped inbound change, as emitted by persistence hooks or read from a
/// JSON-lines dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEnvelope {
    pub entity_kind: String,
    pub entity_id: EntityId,
    #[serde(default = "default_operation")]
    pub operation: ChangeOperation,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

fn default_operation() -> ChangeOperation {
    ChangeOperation::Updated
}

impl ChangeEnvelope {
    /// Convert into a typed event.
    ///
    /// Returns `None` when the kind is not one the router knows about; such
    /// changes are ignored, not rejected.
    pub fn to_event(&self) -> Option<ChangeEvent> {
        let Ok(kind) = self.entity_kind.parse::<EntityKind>() else {
            debug!(entity_kind = %self.entity_kind, "Ignoring change for unrecognized entity kind");
            return None;
        };

        let subject = match kind {
            EntityKind::Settings => Subject::Settings,
            EntityKind::Client => Subject::Client,
            EntityKind::Division => Subject::Division {
                slug: self.string_attr("slug"),
            },
            EntityKind::Product => Subject::Product {
                division_id: self.id_attr("division_id"),
            },
            EntityKind::Technology => Subject::Technology {
                division_id: self.id_attr("division_id"),
            },
            EntityKind::Machine => Subject::Machine {
                division_id: self.id_attr("division_id"),
            },
            EntityKind::Media => Subject::Media {
                is_home_slider: self.bool_attr("is_home_slider"),
                mediable: self.mediable_attr(),
            },
            EntityKind::Milestone => Subject::Milestone,
        };

        Some(ChangeEvent::new(self.entity_id, self.operation, subject))
    }

    fn string_attr(&self, key: &str) -> Option<String> {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn id_attr(&self, key: &str) -> Option<EntityId> {
        match self.attributes.get(key)? {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    fn bool_attr(&self, key: &str) -> bool {
        match self.attributes.get(key) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(number)) => number.as_i64().is_some_and(|value| value != 0),
            Some(Value::String(text)) => matches!(text.trim(), "1" | "true"),
            _ => false,
        }
    }

    fn mediable_attr(&self) -> Option<Mediable> {
        let mediable_type = self.string_attr("mediable_type")?;
        let mediable_id = self.id_attr("mediable_id").unwrap_or(0);
        Mediable::from_parts(&mediable_type, mediable_id).ok()
    }
}

/// A change waiting in the queue, with idempotency and ordering metadata.
#[derive(Debug, Clone)]
pub struct QueuedChange {
    pub id: Uuid,
    pub epoch: Epoch,
    pub event: ChangeEvent,
    pub timestamp: OffsetDateTime,
}

impl QueuedChange {
    pub fn new(event: ChangeEvent, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            event,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// In-memory FIFO of committed changes awaiting invalidation.
///
/// The queue uses a mutex since contention is expected to be low.
pub struct ChangeQueue {
    queue: Mutex<VecDeque<QueuedChange>>,
    epoch_counter: AtomicU64,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, event: ChangeEvent) {
        let change = QueuedChange::new(event, self.next_epoch());

        info!(
            change_id = %change.id,
            change_epoch = change.epoch,
            entity_kind = %change.event.kind(),
            entity_id = change.event.entity_id,
            operation = ?change.event.operation,
            "Content change enqueued"
        );

        mutex_lock(&self.queue, SOURCE, "publish").push_back(change);
    }

    /// Drain up to `limit` changes in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<QueuedChange> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        queue.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.queue, SOURCE, "clear").clear();
    }
}

impl Default for ChangeQueue {
    fn default() -> Self {
        Self::new()
    }
}
