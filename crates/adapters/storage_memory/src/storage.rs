//! In-memory implementation of [`StorageProvider`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::Stream;

use terrarium_app::change_feed::ChangeFeed;
use terrarium_app::ports::StorageProvider;
use terrarium_app::validator::{ValidatedEntity, ValidatedUpdate};
use terrarium_domain::change::ChangeEvent;
use terrarium_domain::entity::{Entity, EntityKind};
use terrarium_domain::error::{ConflictError, NotFoundError, SubscriptionLagged, TerrariumError};
use terrarium_domain::id::EntityId;
use terrarium_domain::query::{Page, PageRequest, Predicate, Query};

use crate::error::MemoryError;

/// Change feed capacity used by [`MemoryStorage::default`].
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

type Store = HashMap<EntityId, Entity>;

/// Entities kept in a locked map, tombstones included.
///
/// Cloning is cheap and every clone shares the same store and feed.
#[derive(Clone)]
pub struct MemoryStorage {
    store: Arc<RwLock<Store>>,
    feed: ChangeFeed,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl MemoryStorage {
    /// Create an empty store whose change feed buffers `feed_capacity` events.
    ///
    /// # Panics
    ///
    /// Panics if `feed_capacity` is zero.
    #[must_use]
    pub fn new(feed_capacity: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            feed: ChangeFeed::new(feed_capacity),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Store>, MemoryError> {
        self.store.read().map_err(|_| MemoryError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Store>, MemoryError> {
        self.store.write().map_err(|_| MemoryError::Poisoned)
    }
}

impl StorageProvider for MemoryStorage {
    async fn get_including_deleted(
        &self,
        kind: EntityKind,
        id: EntityId,
    ) -> Result<Option<Entity>, TerrariumError> {
        let store = self.read()?;
        Ok(store.get(&id).filter(|e| e.kind() == kind).cloned())
    }

    async fn fetch_page(&self, query: &Query, page: PageRequest) -> Result<Page, TerrariumError> {
        let mut matching: Vec<Entity> = {
            let store = self.read()?;
            store.values().filter(|e| query.matches(e)).cloned().collect()
        };
        query.order(&mut matching);
        Ok(Page::slice(query, matching, page))
    }

    #[tracing::instrument(skip_all, fields(kind = %entity.kind(), id = %entity.id()))]
    async fn create(&self, entity: ValidatedEntity) -> Result<Entity, TerrariumError> {
        // the write lock is held while publishing so events follow commit order
        let mut store = self.write()?;
        if let Some(existing) = store.get(&entity.id()) {
            if entity.is_client_supplied() && entity.same_content_as(existing) {
                tracing::debug!("replayed create");
                return Ok(existing.clone());
            }
            return Err(ConflictError::DuplicateId {
                kind: entity.kind(),
                id: entity.id(),
            }
            .into());
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

    #[tracing::instrument(skip_all, fields(kind = %update.kind(), id = %update.id()))]
    async fn update(&self, update: ValidatedUpdate) -> Result<Entity, TerrariumError> {
        let mut store = self.write()?;
        if let Some(claim) = update.slot_claim()
            && let Some(occupant) = store.values().find(|other| claim.is_blocked_by(other))
        {
            return Err(claim.occupied_by(occupant));
        }
        let current = store
            .get(&update.id())
            .filter(|e| e.kind() == update.kind())
            .cloned();
        let next = update.apply_to(current)?;
        store.insert(next.id, next.clone());
        self.feed.publish(ChangeEvent::updated(next.clone()));
        Ok(next)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<Entity, TerrariumError> {
        let mut store = self.write()?;
        let tombstone = store
            .get(&id)
            .filter(|e| e.kind() == kind && e.is_active())
            .cloned()
            .ok_or(NotFoundError { kind, id })?
            .tombstoned();
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
