//! Entity service — use-cases for creating, reading, updating and deleting
//! entities of any kind.

use futures::{Stream, TryStreamExt};
use terrarium_domain::entity::{Entity, EntityKind, Fields, Version};
use terrarium_domain::error::{TerrariumError, UnknownFieldError};
use terrarium_domain::id::{EntityId, ReptileId};
use terrarium_domain::mutation::Mutation;
use terrarium_domain::query::{Predicate, Query, Sort};
use terrarium_domain::schema;
use terrarium_domain::time::Timestamp;

use crate::ports::{IdentityProvider, StorageProvider};
use crate::validator::{IntegrityPolicy, IntegrityValidator, stale};

/// How often [`EntityService::update_with_retry`] re-fetches and resubmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Application service for entity lifecycle.
///
/// Every write goes through the [`IntegrityValidator`] before it reaches the
/// storage provider.
pub struct EntityService<S, I> {
    storage: S,
    identity: I,
    validator: IntegrityValidator<S>,
}

impl<S, I> EntityService<S, I>
where
    S: StorageProvider + Clone,
    I: IdentityProvider,
{
    /// Create a new service backed by the given storage and identity.
    pub fn new(storage: S, identity: I, policy: IntegrityPolicy) -> Self {
        Self {
            validator: IntegrityValidator::new(storage.clone(), policy),
            storage,
            identity,
        }
    }

    /// Validate untyped input and create an entity of `kind`.
    ///
    /// The current user is attached as `userID` unless the input names one.
    ///
    /// # Errors
    ///
    /// Returns [`TerrariumError::Validation`] if the input is invalid,
    /// [`TerrariumError::Conflict`] if a client-supplied id is taken by
    /// different content, or a storage error.
    #[tracing::instrument(skip(self, fields))]
    pub async fn create(
        &self,
        kind: EntityKind,
        mut fields: Fields,
    ) -> Result<Entity, TerrariumError> {
        if !fields.contains(schema::USER_ID)
            && let Some(user) = self.identity.current_user()
        {
            fields.insert(schema::USER_ID, (&user).into());
        }
        let validated = self.validator.validate_create(kind, &fields).await?;
        let entity = self.storage.create(validated).await?;
        tracing::debug!(id = %entity.id, "entity created");
        Ok(entity)
    }

    /// Look up a live entity by id.
    ///
    /// # Errors
    ///
    /// Returns [`TerrariumError::NotFound`] when no live entity with `id`
    /// exists, or a storage error.
    pub async fn get(&self, kind: EntityKind, id: EntityId) -> Result<Entity, TerrariumError> {
        self.storage.get(kind, id).await
    }

    /// Lazily list live entities matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownFieldError`] when the query names an undeclared field.
    pub fn list(
        &self,
        query: Query,
    ) -> Result<impl Stream<Item = Result<Entity, TerrariumError>> + Send + '_, UnknownFieldError>
    {
        query.check()?;
        Ok(self.storage.list(query))
    }

    /// Collect every live entity matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`TerrariumError::UnknownField`] for an invalid query, or a
    /// storage error.
    pub async fn collect(&self, query: Query) -> Result<Vec<Entity>, TerrariumError> {
        self.list(query)?.try_collect().await
    }

    /// Apply `mutation` to the entity as observed at `base_version`.
    ///
    /// # Errors
    ///
    /// Returns [`TerrariumError::Conflict`] when the entity moved past
    /// `base_version`, [`TerrariumError::NotFound`] when it is gone,
    /// [`TerrariumError::Validation`] when the mutation is invalid, or a
    /// storage error.
    #[tracing::instrument(skip(self, mutation))]
    pub async fn update(
        &self,
        kind: EntityKind,
        id: EntityId,
        base_version: Version,
        mutation: &Mutation,
    ) -> Result<Entity, TerrariumError> {
        let base = self.storage.get(kind, id).await?;
        if base.version != base_version {
            return Err(stale(kind, id, base_version, base.version));
        }
        let validated = self.validator.validate_update(&base, mutation).await?;
        let entity = self.storage.update(validated).await?;
        tracing::debug!(version = entity.version, "entity updated");
        Ok(entity)
    }

    /// Apply a commutative mutation, re-fetching the base and resubmitting
    /// whenever a concurrent writer wins.
    ///
    /// # Errors
    ///
    /// Returns the last [`TerrariumError::Conflict`] once `policy` is
    /// exhausted, or any other error from [`update`](Self::update) at once.
    #[tracing::instrument(skip(self, mutation))]
    pub async fn update_with_retry(
        &self,
        kind: EntityKind,
        id: EntityId,
        mutation: &Mutation,
        policy: RetryPolicy,
    ) -> Result<Entity, TerrariumError> {
        let mut attempt = 1;
        loop {
            let base = self.storage.get(kind, id).await?;
            match self.update(kind, id, base.version, mutation).await {
                Err(TerrariumError::Conflict(err)) if attempt < policy.max_attempts => {
                    tracing::debug!(attempt, error = %err, "update lost a race, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Tombstone a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`TerrariumError::NotFound`] when the entity is missing or
    /// already deleted, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<Entity, TerrariumError> {
        let tombstone = self.storage.delete(kind, id).await?;
        tracing::debug!(version = tombstone.version, "entity deleted");
        Ok(tombstone)
    }

    /// Log entries of one reptile, ordered by their event time.
    ///
    /// `from` and `to` bound the event time inclusively.
    ///
    /// # Errors
    ///
    /// Returns [`TerrariumError::UnknownField`] when `log_kind` is not a log
    /// kind, or a storage error.
    pub async fn history(
        &self,
        log_kind: EntityKind,
        reptile: ReptileId,
        from: Option<Timestamp>,
        to: Option<Timestamp>,
    ) -> Result<Vec<Entity>, TerrariumError> {
        let event_time = log_kind.event_time_field().ok_or_else(|| UnknownFieldError {
            kind: log_kind,
            field: "reptileID".to_string(),
        })?;
        let query = Query::new(log_kind)
            .filter(Predicate::all().eq("reptileID", reptile).range(
                event_time,
                from.map(Into::into),
                to.map(Into::into),
            ))
            .sort_by(Sort::ascending(event_time));
        self.collect(query).await
    }
}
