//! In-memory content adapters.
//!
//! `StaticDivisions` answers division lookups from a fixed map.
//! `InMemoryContentStore` keeps every content table in memory and drives the
//! cache trigger once each write has been applied.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::application::repos::{DivisionDirectory, RepoError};
use crate::cache::{CacheTrigger, ChangeOperation, TagSet};
use crate::domain::entities::{
    ClientRecord, DivisionRecord, EntityId, MachineRecord, MediaRecord, MilestoneRecord,
    ProductRecord, SettingsRecord, TechnologyRecord,
};
use crate::domain::error::DomainError;
use crate::domain::types::EntityKind;

/// Fixed id → slug map.
#[derive(Debug, Clone, Default)]
pub struct StaticDivisions {
    slugs: HashMap<EntityId, String>,
}

impl StaticDivisions {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (EntityId, &'a str)>) -> Self {
        Self {
            slugs: pairs
                .into_iter()
                .map(|(id, slug)| (id, slug.to_string()))
                .collect(),
        }
    }

    pub fn insert(&mut self, id: EntityId, slug: impl Into<String>) {
        self.slugs.insert(id, slug.into());
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }
}

#[async_trait]
impl DivisionDirectory for StaticDivisions {
    async fn find_slug(&self, id: EntityId) -> Result<Option<String>, RepoError> {
        Ok(self.slugs.get(&id).cloned())
    }
}

#[derive(Default)]
struct ContentState {
    settings: SettingsRecord,
    clients: BTreeMap<EntityId, ClientRecord>,
    divisions: BTreeMap<EntityId, DivisionRecord>,
    products: BTreeMap<EntityId, ProductRecord>,
    technologies: BTreeMap<EntityId, TechnologyRecord>,
    machines: BTreeMap<EntityId, MachineRecord>,
    media: BTreeMap<EntityId, MediaRecord>,
    milestones: BTreeMap<EntityId, MilestoneRecord>,
}

/// A record type stored in one table of [`ContentState`].
trait Stored: Clone + Send + Sync {
    const KIND: EntityKind;

    fn id(&self) -> EntityId;

    fn table(state: &ContentState) -> &BTreeMap<EntityId, Self>;

    fn table_mut(state: &mut ContentState) -> &mut BTreeMap<EntityId, Self>;
}

macro_rules! stored {
    ($record:ty, $kind:expr, $table:ident) => {
        impl Stored for $record {
            const KIND: EntityKind = $kind;

            fn id(&self) -> EntityId {
                self.id
            }

            fn table(state: &ContentState) -> &BTreeMap<EntityId, Self> {
                &state.$table
            }

            fn table_mut(state: &mut ContentState) -> &mut BTreeMap<EntityId, Self> {
                &mut state.$table
            }
        }
    };
}

stored!(ClientRecord, EntityKind::Client, clients);
stored!(DivisionRecord, EntityKind::Division, divisions);
stored!(ProductRecord, EntityKind::Product, products);
stored!(TechnologyRecord, EntityKind::Technology, technologies);
stored!(MachineRecord, EntityKind::Machine, machines);
stored!(MediaRecord, EntityKind::Media, media);
stored!(MilestoneRecord, EntityKind::Milestone, milestones);

/// Shared handle to the in-memory tables.
///
/// Clones see the same data; one clone typically backs the invalidation
/// router's division lookups while another backs the store.
#[derive(Clone, Default)]
pub struct ContentTables {
    state: Arc<RwLock<ContentState>>,
}

#[async_trait]
impl DivisionDirectory for ContentTables {
    async fn find_slug(&self, id: EntityId) -> Result<Option<String>, RepoError> {
        let state = self.state.read().await;
        Ok(state.divisions.get(&id).map(|division| division.slug.clone()))
    }
}

/// Content store that invalidates the cache after each committed write.
///
/// The write lock is released before the trigger runs, so the router's
/// division lookups observe the committed state.
pub struct InMemoryContentStore {
    tables: ContentTables,
    trigger: Arc<CacheTrigger>,
}

impl InMemoryContentStore {
    pub fn new(tables: ContentTables, trigger: Arc<CacheTrigger>) -> Self {
        Self { tables, trigger }
    }

    pub fn tables(&self) -> &ContentTables {
        &self.tables
    }

    pub fn trigger(&self) -> &Arc<CacheTrigger> {
        &self.trigger
    }

    async fn commit_save<R: Stored>(&self, record: R) -> ChangeOperation {
        let mut state = self.tables.state.write().await;
        let previous = R::table_mut(&mut state).insert(record.id(), record.clone());
        let operation = if previous.is_some() {
            ChangeOperation::Updated
        } else {
            ChangeOperation::Created
        };
        debug!(
            entity_kind = R::KIND.as_str(),
            entity_id = record.id(),
            ?operation,
            "Content write committed"
        );
        operation
    }

    async fn commit_delete<R: Stored>(&self, id: EntityId) -> Result<R, DomainError> {
        let mut state = self.tables.state.write().await;
        let removed = R::table_mut(&mut state)
            .remove(&id)
            .ok_or_else(|| DomainError::not_found(R::KIND, id))?;
        debug!(entity_kind = R::KIND.as_str(), entity_id = id, "Content delete committed");
        Ok(removed)
    }

    async fn find<R: Stored>(&self, id: EntityId) -> Option<R> {
        let state = self.tables.state.read().await;
        R::table(&state).get(&id).cloned()
    }

    #[instrument(skip_all)]
    pub async fn save_settings(&self, record: SettingsRecord) -> TagSet {
        {
            let mut state = self.tables.state.write().await;
            state.settings = record.clone();
        }
        self.trigger.settings_saved(&record).await
    }

    pub async fn settings(&self) -> SettingsRecord {
        self.tables.state.read().await.settings.clone()
    }

    #[instrument(skip_all, fields(entity_id = record.id))]
    pub async fn save_client(&self, record: ClientRecord) -> TagSet {
        let op = self.commit_save(record.clone()).await;
        self.trigger.client_changed(&record, op).await
    }

    pub async fn delete_client(&self, id: EntityId) -> Result<TagSet, DomainError> {
        let record: ClientRecord = self.commit_delete(id).await?;
        Ok(self
            .trigger
            .client_changed(&record, ChangeOperation::Deleted)
            .await)
    }

    pub async fn client(&self, id: EntityId) -> Option<ClientRecord> {
        self.find(id).await
    }

    #[instrument(skip_all, fields(entity_id = record.id))]
    pub async fn save_division(&self, record: DivisionRecord) -> TagSet {
        let op = self.commit_save(record.clone()).await;
        self.trigger.division_changed(&record, op).await
    }

    /// Remove a division; its products, technologies, machines and media
    /// stay in place.
    pub async fn delete_division(&self, id: EntityId) -> Result<TagSet, DomainError> {
        let record: DivisionRecord = self.commit_delete(id).await?;
        Ok(self
            .trigger
            .division_changed(&record, ChangeOperation::Deleted)
            .await)
    }

    pub async fn division(&self, id: EntityId) -> Option<DivisionRecord> {
        self.find(id).await
    }

    #[instrument(skip_all, fields(entity_id = record.id))]
    pub async fn save_product(&self, record: ProductRecord) -> TagSet {
        let op = self.commit_save(record.clone()).await;
        self.trigger.product_changed(&record, op).await
    }

    pub async fn delete_product(&self, id: EntityId) -> Result<TagSet, DomainError> {
        let record: ProductRecord = self.commit_delete(id).await?;
        Ok(self
            .trigger
            .product_changed(&record, ChangeOperation::Deleted)
            .await)
    }

    pub async fn product(&self, id: EntityId) -> Option<ProductRecord> {
        self.find(id).await
    }

    #[instrument(skip_all, fields(entity_id = record.id))]
    pub async fn save_technology(&self, record: TechnologyRecord) -> TagSet {
        let op = self.commit_save(record.clone()).await;
        self.trigger.technology_changed(&record, op).await
    }

    pub async fn delete_technology(&self, id: EntityId) -> Result<TagSet, DomainError> {
        let record: TechnologyRecord = self.commit_delete(id).await?;
        Ok(self
            .trigger
            .technology_changed(&record, ChangeOperation::Deleted)
            .await)
    }

    #[instrument(skip_all, fields(entity_id = record.id))]
    pub async fn save_machine(&self, record: MachineRecord) -> TagSet {
        let op = self.commit_save(record.clone()).await;
        self.trigger.machine_changed(&record, op).await
    }

    pub async fn delete_machine(&self, id: EntityId) -> Result<TagSet, DomainError> {
        let record: MachineRecord = self.commit_delete(id).await?;
        Ok(self
            .trigger
            .machine_changed(&record, ChangeOperation::Deleted)
            .await)
    }

    #[instrument(skip_all, fields(entity_id = record.id))]
    pub async fn save_media(&self, record: MediaRecord) -> TagSet {
        let op = self.commit_save(record.clone()).await;
        self.trigger.media_changed(&record, op).await
    }

    pub async fn delete_media(&self, id: EntityId) -> Result<TagSet, DomainError> {
        let record: MediaRecord = self.commit_delete(id).await?;
        Ok(self
            .trigger
            .media_changed(&record, ChangeOperation::Deleted)
            .await)
    }

    #[instrument(skip_all, fields(entity_id = record.id))]
    pub async fn save_milestone(&self, record: MilestoneRecord) -> TagSet {
        let op = self.commit_save(record.clone()).await;
        self.trigger.milestone_changed(&record, op).await
    }

    pub async fn delete_milestone(&self, id: EntityId) -> Result<TagSet, DomainError> {
        let record: MilestoneRecord = self.commit_delete(id).await?;
        Ok(self
            .trigger
            .milestone_changed(&record, ChangeOperation::Deleted)
            .await)
    }
}

#[async_trait]
impl DivisionDirectory for InMemoryContentStore {
    async fn find_slug(&self, id: EntityId) -> Result<Option<String>, RepoError> {
        self.tables.find_slug(id).await
    }
}
