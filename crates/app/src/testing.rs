//! In-memory storage fake shared by the service tests.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::Stream;

use terrarium_domain::change::ChangeEvent;
use terrarium_domain::entity::{Entity, EntityKind, Fields, Reptile};
use terrarium_domain::error::{ConflictError, NotFoundError, SubscriptionLagged, TerrariumError};
use terrarium_domain::id::EntityId;
use terrarium_domain::query::{Page, PageRequest, Predicate, Query};
use terrarium_domain::value::{ContainerKind, Gender};

use crate::change_feed::ChangeFeed;
use crate::ports::StorageProvider;
use crate::validator::{IntegrityPolicy, IntegrityValidator, ValidatedEntity, ValidatedUpdate};

pub(crate) struct InMemoryStorage {
    store: Mutex<HashMap<EntityId, Entity>>,
    feed: ChangeFeed,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
            feed: ChangeFeed::new(64),
        }
    }
}

impl InMemoryStorage {
    /// Put an entity in place without validation or notification.
    pub(crate) fn insert_raw(&self, entity: Entity) {
        self.store.lock().unwrap().insert(entity.id, entity);
    }
}

impl StorageProvider for InMemoryStorage {
    async fn get_including_deleted(
        &self,
        kind: EntityKind,
        id: EntityId,
    ) -> Result<Option<Entity>, TerrariumError> {
        let store = self.store.lock().unwrap();
        Ok(store.get(&id).filter(|e| e.kind() == kind).cloned())
    }

    async fn fetch_page(&self, query: &Query, page: PageRequest) -> Result<Page, TerrariumError> {
        let mut matching: Vec<Entity> = {
            let store = self.store.lock().unwrap();
            store.values().filter(|e| query.matches(e)).cloned().collect()
        };
        query.order(&mut matching);
        Ok(Page::slice(query, matching, page))
    }

    async fn create(&self, entity: ValidatedEntity) -> Result<Entity, TerrariumError> {
        let mut store = self.store.lock().unwrap();
        if let Some(existing) = store.get(&entity.id()) {
            return if entity.same_content_as(existing) {
                Ok(existing.clone())
            } else {
                Err(ConflictError::DuplicateId {
                    kind: entity.kind(),
                    id: entity.id(),
                }
                .into())
            };
        }
        if let Some(claim) = entity.slot_claim()
            && let Some(occupant) = store.values().find(|other| claim.is_blocked_by(other))
        {
            return Err(claim.occupied_by(occupant));
        }
        let entity = entity.into_entity();
        store.insert(entity.id, entity.clone());
        self.feed.publish(ChangeEvent::created(entity.clone()));
        Ok(entity)
    }

    async fn update(&self, update: ValidatedUpdate) -> Result<Entity, TerrariumError> {
        let mut store = self.store.lock().unwrap();
        if let Some(claim) = update.slot_claim()
            && let Some(occupant) = store.values().find(|other| claim.is_blocked_by(other))
        {
            return Err(claim.occupied_by(occupant));
        }
        let current = store.get(&update.id()).cloned();
        let next = update.apply_to(current)?;
        store.insert(next.id, next.clone());
        self.feed.publish(ChangeEvent::updated(next.clone()));
        Ok(next)
    }

    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<Entity, TerrariumError> {
        let mut store = self.store.lock().unwrap();
        let current = store
            .get(&id)
            .filter(|e| e.kind() == kind && e.is_active())
            .cloned()
            .ok_or(NotFoundError { kind, id })?;
        let tombstone = current.tombstoned();
        store.insert(id, tombstone.clone());
        self.feed.publish(ChangeEvent::deleted(tombstone.clone()));
        Ok(tombstone)
    }

    fn subscribe(
        &self,
        kind: EntityKind,
        predicate: Predicate,
    ) -> impl Stream<Item = Result<ChangeEvent, SubscriptionLagged>> + Send + 'static {
        self.feed.subscribe(kind, predicate)
    }
}

/// Ids of a fully wired placement: type, box, slot.
pub(crate) struct Placement {
    pub reptile_type: EntityId,
    pub feeding_box: EntityId,
    pub slot: EntityId,
}

pub(crate) async fn create<S: StorageProvider>(
    storage: &S,
    kind: EntityKind,
    fields: Fields,
) -> Entity {
    let validator = IntegrityValidator::new(storage, IntegrityPolicy::default());
    let validated = validator.validate_create(kind, &fields).await.unwrap();
    storage.create(validated).await.unwrap()
}

pub(crate) async fn placement<S: StorageProvider>(storage: &S) -> Placement {
    let reptile_type = create(
        storage,
        EntityKind::ReptileType,
        Fields::new().with("name", "Leopard Gecko"),
    )
    .await;
    let feeding_box = create(
        storage,
        EntityKind::ReptileFeedingBox,
        Fields::new()
            .with("kind", ContainerKind::Box)
            .with("name", "Rack A"),
    )
    .await;
    let slot = create(
        storage,
        EntityKind::ReptileFeedingBoxIndexCollection,
        Fields::new()
            .with("verticalIndex", 2_i64)
            .with("horizontalIndex", 3_i64)
            .with("reptileFeedingBoxID", feeding_box.id),
    )
    .await;
    Placement {
        reptile_type: reptile_type.id,
        feeding_box: feeding_box.id,
        slot: slot.id,
    }
}

pub(crate) fn reptile_input(placement: &Placement, name: &str) -> Fields {
    Reptile::builder()
        .name(name)
        .gender(Gender::Unknown)
        .reptile_type_id(placement.reptile_type.into())
        .feeding_box_id(placement.feeding_box.into())
        .slot_id(placement.slot.into())
        .build()
}
