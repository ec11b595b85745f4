//! Storage port — the query and change contract a persistence engine offers.
//!
//! Any engine satisfying this trait is interchangeable: a local cache, a
//! plain database, or a synchronized replica. Writes only accept values that
//! went through the [`IntegrityValidator`](crate::validator::IntegrityValidator).

use std::future::Future;
use std::sync::Arc;

use futures::{Stream, StreamExt, TryStreamExt, stream};

use terrarium_domain::change::ChangeEvent;
use terrarium_domain::entity::{Entity, EntityKind};
use terrarium_domain::error::{NotFoundError, SubscriptionLagged, TerrariumError};
use terrarium_domain::id::EntityId;
use terrarium_domain::query::{Page, PageRequest, Predicate, Query};

use crate::validator::{ValidatedEntity, ValidatedUpdate};

/// Number of entities [`StorageProvider::list`] requests per page.
pub const LIST_PAGE_SIZE: usize = 100;

/// Persistence and change notification for every entity kind.
pub trait StorageProvider: Send + Sync {
    /// Fetch an entity by id, tombstones included.
    fn get_including_deleted(
        &self,
        kind: EntityKind,
        id: EntityId,
    ) -> impl Future<Output = Result<Option<Entity>, TerrariumError>> + Send;

    /// Fetch one page of live entities matching `query`, in query order,
    /// starting strictly after the request's cursor.
    fn fetch_page(
        &self,
        query: &Query,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page, TerrariumError>> + Send;

    /// Persist a validated entity at version 1 and emit `Created`.
    ///
    /// Replaying a create with a client-supplied id and identical content
    /// returns the stored entity; different content is a conflict. A
    /// [`SlotClaim`](crate::validator::SlotClaim) carried by the entity is
    /// checked again inside the write.
    fn create(
        &self,
        entity: ValidatedEntity,
    ) -> impl Future<Output = Result<Entity, TerrariumError>> + Send;

    /// Apply a validated update if the stored version still equals its base
    /// version, and emit `Updated`. Slot claims are checked as for
    /// [`create`](Self::create).
    fn update(
        &self,
        update: ValidatedUpdate,
    ) -> impl Future<Output = Result<Entity, TerrariumError>> + Send;

    /// Tombstone a live entity, emit `Deleted`, and return the tombstone.
    fn delete(
        &self,
        kind: EntityKind,
        id: EntityId,
    ) -> impl Future<Output = Result<Entity, TerrariumError>> + Send;

    /// Committed changes to entities of `kind` matching `predicate`, from now on.
    ///
    /// A consumer that falls behind receives [`SubscriptionLagged`] and should
    /// re-derive its state from [`list`](Self::list).
    fn subscribe(
        &self,
        kind: EntityKind,
        predicate: Predicate,
    ) -> impl Stream<Item = Result<ChangeEvent, SubscriptionLagged>> + Send + 'static;

    /// Fetch a live entity by id.
    fn get(
        &self,
        kind: EntityKind,
        id: EntityId,
    ) -> impl Future<Output = Result<Entity, TerrariumError>> + Send {
        async move {
            match self.get_including_deleted(kind, id).await? {
                Some(entity) if entity.is_active() => Ok(entity),
                _ => Err(NotFoundError { kind, id }.into()),
            }
        }
    }

    /// Every live entity matching `query`, fetched lazily page by page.
    ///
    /// Each page resumes after the last entity of the previous one, so an
    /// entity that stays live and matching for the whole listing is yielded
    /// exactly once. Calling it again starts a fresh listing.
    fn list(&self, query: Query) -> impl Stream<Item = Result<Entity, TerrariumError>> + Send {
        stream::try_unfold(
            Some(PageRequest::first(LIST_PAGE_SIZE)),
            move |next| {
                let query = query.clone();
                async move {
                    let Some(request) = next else {
                        return Ok::<_, TerrariumError>(None);
                    };
                    let page = self.fetch_page(&query, request).await?;
                    let entities = stream::iter(page.entities.into_iter().map(Ok));
                    Ok(Some((entities, page.next)))
                }
            },
        )
        .try_flatten()
        .boxed()
    }
}

macro_rules! forward_storage_provider {
    ($($wrapper:ty),+) => {$(
        impl<T: StorageProvider> StorageProvider for $wrapper {
            fn get_including_deleted(
                &self,
                kind: EntityKind,
                id: EntityId,
            ) -> impl Future<Output = Result<Option<Entity>, TerrariumError>> + Send {
                (**self).get_including_deleted(kind, id)
            }

            fn fetch_page(
                &self,
                query: &Query,
                page: PageRequest,
            ) -> impl Future<Output = Result<Page, TerrariumError>> + Send {
                (**self).fetch_page(query, page)
            }

            fn create(
                &self,
                entity: ValidatedEntity,
            ) -> impl Future<Output = Result<Entity, TerrariumError>> + Send {
                (**self).create(entity)
            }

            fn update(
                &self,
                update: ValidatedUpdate,
            ) -> impl Future<Output = Result<Entity, TerrariumError>> + Send {
                (**self).update(update)
            }

            fn delete(
                &self,
                kind: EntityKind,
                id: EntityId,
            ) -> impl Future<Output = Result<Entity, TerrariumError>> + Send {
                (**self).delete(kind, id)
            }

            fn subscribe(
                &self,
                kind: EntityKind,
                predicate: Predicate,
            ) -> impl Stream<Item = Result<ChangeEvent, SubscriptionLagged>> + Send + 'static {
                (**self).subscribe(kind, predicate)
            }
        }
    )+};
}

forward_storage_provider!(Arc<T>, &T);
