//! Integrity validator — the single gate between untyped input and storage.
//!
//! Structural rules come from [`terrarium_domain::validation`] and are
//! accumulated. Foreign keys are then resolved concurrently through the
//! [`StorageProvider`]; the first unresolved one, in declaration order,
//! aborts validation. Cross-entity rules run last, once every parent is known.

use std::time::Duration;

use futures::future::join_all;
use terrarium_domain::entity::{
    Entity, EntityData, EntityKind, Fields, Reptile, ReptileFeedingBoxIndexCollection, Version,
};
use terrarium_domain::error::{
    ConflictError, NotFoundError, ReferentialIntegrityError, TerrariumError, UnresolvedReason,
    ValidationError, ValidationErrors,
};
use terrarium_domain::id::{EntityId, SlotId, UserId};
use terrarium_domain::mutation::Mutation;
use terrarium_domain::query::{PageRequest, Predicate, Query};
use terrarium_domain::schema;
use terrarium_domain::time::{self, Timestamp};
use terrarium_domain::validation::{self, CheckedCreate};

use crate::ports::StorageProvider;

/// Deployment choices for the rules the data model leaves open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityPolicy {
    /// Whether several live reptiles may reference the same slot.
    pub allow_multiple_occupants_per_slot: bool,
    /// Reject references to parents owned by another user instead of
    /// logging them.
    pub enforce_tenant_consistency: bool,
    /// Upper bound for a single reference lookup.
    pub lookup_timeout: Option<Duration>,
}

impl Default for IntegrityPolicy {
    fn default() -> Self {
        Self {
            allow_multiple_occupants_per_slot: true,
            enforce_tenant_consistency: false,
            lookup_timeout: None,
        }
    }
}

/// A normalized entity ready to be created: identity and timestamps are
/// assigned, every reference resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEntity {
    id: EntityId,
    client_supplied_id: bool,
    user_id: Option<UserId>,
    created_at: Timestamp,
    data: EntityData,
    slot_claim: Option<SlotClaim>,
}

impl ValidatedEntity {
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    /// Whether the caller chose the id, making the create replayable.
    #[must_use]
    pub fn is_client_supplied(&self) -> bool {
        self.client_supplied_id
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    #[must_use]
    pub fn data(&self) -> &EntityData {
        &self.data
    }

    /// Exclusive slot the provider must still find free when writing.
    #[must_use]
    pub fn slot_claim(&self) -> Option<SlotClaim> {
        self.slot_claim
    }

    /// Whether `stored` carries the same content, for idempotent replays.
    #[must_use]
    pub fn same_content_as(&self, stored: &Entity) -> bool {
        stored.is_active() && stored.user_id == self.user_id && stored.data == self.data
    }

    /// The entity as first stored, at version 1.
    #[must_use]
    pub fn into_entity(self) -> Entity {
        Entity {
            id: self.id,
            user_id: self.user_id,
            version: 1,
            created_at: self.created_at,
            updated_at: self.created_at,
            deleted: false,
            data: self.data,
        }
    }
}

/// A validated next version of an entity, bound to the base version it was
/// derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUpdate {
    id: EntityId,
    base_version: Version,
    user_id: Option<UserId>,
    data: EntityData,
    slot_claim: Option<SlotClaim>,
}

impl ValidatedUpdate {
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    #[must_use]
    pub fn base_version(&self) -> Version {
        self.base_version
    }

    #[must_use]
    pub fn data(&self) -> &EntityData {
        &self.data
    }

    /// Exclusive slot the provider must still find free when writing.
    #[must_use]
    pub fn slot_claim(&self) -> Option<SlotClaim> {
        self.slot_claim
    }

    /// Produce the next version of `current`.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when `current` is missing or tombstoned, and
    /// [`ConflictError::StaleVersion`](terrarium_domain::error::ConflictError)
    /// when it moved past the base version.
    pub fn apply_to(self, current: Option<Entity>) -> Result<Entity, TerrariumError> {
        let kind = self.kind();
        let current = current
            .filter(Entity::is_active)
            .ok_or(NotFoundError { kind, id: self.id })?;
        if current.version != self.base_version {
            return Err(stale(kind, self.id, self.base_version, current.version));
        }
        Ok(Entity {
            id: current.id,
            user_id: self.user_id,
            version: current.version + 1,
            created_at: current.created_at,
            updated_at: time::advance(current.updated_at),
            deleted: false,
            data: self.data,
        })
    }
}

/// Exclusive hold on a slot, taken when several occupants are not allowed.
///
/// The validator checks occupancy before the write; providers repeat the
/// check while holding their write lock so concurrent placements into one
/// slot cannot both succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotClaim {
    pub slot: SlotId,
    pub claimant: EntityId,
}

impl SlotClaim {
    /// Whether `other` is another live reptile already in the slot.
    #[must_use]
    pub fn is_blocked_by(&self, other: &Entity) -> bool {
        other.id != self.claimant
            && other.is_active()
            && other
                .data_as::<Reptile>()
                .is_some_and(|reptile| reptile.slot_id == self.slot)
    }

    /// Failure reported when `occupant` holds the slot.
    #[must_use]
    pub fn occupied_by(&self, occupant: &Entity) -> TerrariumError {
        ValidationError::SlotOccupied {
            slot: self.slot,
            occupant: occupant.id.into(),
        }
        .into()
    }
}

/// Conflict raised when the stored version is not the one an update was based on.
#[must_use]
pub fn stale(kind: EntityKind, id: EntityId, expected: Version, actual: Version) -> TerrariumError {
    ConflictError::StaleVersion {
        kind,
        id,
        expected,
        actual,
    }
    .into()
}

/// Validates creation input and update-by-copy mutations.
pub struct IntegrityValidator<S> {
    storage: S,
    policy: IntegrityPolicy,
}

impl<S: StorageProvider> IntegrityValidator<S> {
    /// Create a validator resolving references through `storage`.
    pub fn new(storage: S, policy: IntegrityPolicy) -> Self {
        Self { storage, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &IntegrityPolicy {
        &self.policy
    }

    /// Validate untyped creation input and assign identity and timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`TerrariumError::Validation`] listing every structural problem,
    /// or the single first unresolved reference, or a cross-entity rule
    /// violation. Storage failures during lookups are propagated as is.
    #[tracing::instrument(skip(self, input))]
    pub async fn validate_create(
        &self,
        kind: EntityKind,
        input: &Fields,
    ) -> Result<ValidatedEntity, TerrariumError> {
        let CheckedCreate { id, user_id, data } = validation::check_create(kind, input)?;

        let references = references_of(kind, data.foreign_keys());
        let parents = self.resolve(&references).await?;
        self.check_relations(id, &data, user_id.as_ref(), &parents, true)
            .await?;

        let client_supplied_id = id.is_some();
        let id = id.unwrap_or_else(EntityId::new);
        let slot_claim = self.slot_claim(id, &data, true);
        Ok(ValidatedEntity {
            id,
            client_supplied_id,
            user_id,
            created_at: time::now(),
            data,
            slot_claim,
        })
    }

    /// Validate a mutation against the snapshot `base` it was derived from.
    ///
    /// Only references the mutation changes are resolved again.
    ///
    /// # Errors
    ///
    /// Returns [`TerrariumError::NotFound`] when `base` is a tombstone, and
    /// otherwise the same failures as [`validate_create`](Self::validate_create).
    #[tracing::instrument(skip(self, base, mutation), fields(kind = %base.kind(), id = %base.id))]
    pub async fn validate_update(
        &self,
        base: &Entity,
        mutation: &Mutation,
    ) -> Result<ValidatedUpdate, TerrariumError> {
        if base.deleted {
            return Err(NotFoundError {
                kind: base.kind(),
                id: base.id,
            }
            .into());
        }
        let checked = validation::check_update(base, mutation)?;

        let references = references_of(base.kind(), checked.changed_references.clone());
        let parents = self.resolve(&references).await?;
        let placement_changed = checked.changed_references.iter().any(|(field, _)| {
            *field == "reptileFeedingBoxID" || *field == "reptileFeedingBoxIndexCollectionID"
        });
        self.check_relations(
            Some(base.id),
            &checked.data,
            checked.user_id.as_ref(),
            &parents,
            placement_changed,
        )
        .await?;

        let slot_claim = self.slot_claim(base.id, &checked.data, placement_changed);
        Ok(ValidatedUpdate {
            id: base.id,
            base_version: base.version,
            user_id: checked.user_id,
            data: checked.data,
            slot_claim,
        })
    }

    fn slot_claim(
        &self,
        id: EntityId,
        data: &EntityData,
        placement_changed: bool,
    ) -> Option<SlotClaim> {
        if self.policy.allow_multiple_occupants_per_slot || !placement_changed {
            return None;
        }
        match data {
            EntityData::Reptile(reptile) => Some(SlotClaim {
                slot: reptile.slot_id,
                claimant: id,
            }),
            _ => None,
        }
    }

    /// Resolve every reference concurrently and fail on the first unresolved
    /// one in declaration order.
    async fn resolve(&self, references: &[Reference]) -> Result<Vec<Parent>, TerrariumError> {
        let lookups = references.iter().map(|reference| async move {
            let entity = self.lookup(reference).await?;
            Ok(Parent {
                field: reference.field,
                entity,
            })
        });
        join_all(lookups).await.into_iter().collect()
    }

    async fn lookup(&self, reference: &Reference) -> Result<Entity, TerrariumError> {
        let lookup = self
            .storage
            .get_including_deleted(reference.target, reference.id);
        let found = match self.policy.lookup_timeout {
            Some(limit) => tokio::time::timeout(limit, lookup).await.map_err(|_| {
                ValidationError::LookupCancelled {
                    field: reference.field.to_string(),
                }
            })?,
            None => lookup.await,
        }?;
        match found {
            Some(parent) if parent.is_active() => Ok(parent),
            Some(_) => Err(reference.unresolved(UnresolvedReason::Tombstoned)),
            None => Err(reference.unresolved(UnresolvedReason::Missing)),
        }
    }

    /// Rules spanning several entities: slot and box agreement, slot
    /// occupancy and ownership consistency.
    async fn check_relations(
        &self,
        id: Option<EntityId>,
        data: &EntityData,
        owner: Option<&UserId>,
        parents: &[Parent],
        placement_changed: bool,
    ) -> Result<(), TerrariumError> {
        let mut errors = Vec::new();

        if placement_changed && let EntityData::Reptile(reptile) = data {
            self.check_placement(id, reptile, parents, &mut errors)
                .await?;
        }
        self.check_ownership(owner, parents, &mut errors);

        match ValidationErrors::from_vec(errors) {
            Some(errors) => Err(errors.into()),
            None => Ok(()),
        }
    }

    async fn check_placement(
        &self,
        id: Option<EntityId>,
        reptile: &Reptile,
        parents: &[Parent],
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), TerrariumError> {
        let slot_id: EntityId = reptile.slot_id.into();
        let slot = match parents.iter().find(|parent| parent.entity.id == slot_id) {
            Some(parent) => Some(parent.entity.clone()),
            None => {
                self.storage
                    .get_including_deleted(EntityKind::ReptileFeedingBoxIndexCollection, slot_id)
                    .await?
            }
        };
        let slot_box = slot
            .as_ref()
            .and_then(|slot| slot.data_as::<ReptileFeedingBoxIndexCollection>())
            .map(|slot| slot.feeding_box_id);
        if let Some(slot_box) = slot_box
            && slot_box != reptile.feeding_box_id
        {
            errors.push(ValidationError::SlotBoxMismatch {
                slot: reptile.slot_id,
                slot_box,
                reptile_box: reptile.feeding_box_id,
            });
        }

        if !self.policy.allow_multiple_occupants_per_slot {
            let query = Query::new(EntityKind::Reptile).filter(
                Predicate::all().eq("reptileFeedingBoxIndexCollectionID", reptile.slot_id),
            );
            let page = self
                .storage
                .fetch_page(&query, PageRequest::first(2))
                .await?;
            if let Some(occupant) = page.entities.iter().find(|other| Some(other.id) != id) {
                errors.push(ValidationError::SlotOccupied {
                    slot: reptile.slot_id,
                    occupant: occupant.id.into(),
                });
            }
        }
        Ok(())
    }

    fn check_ownership(
        &self,
        owner: Option<&UserId>,
        parents: &[Parent],
        errors: &mut Vec<ValidationError>,
    ) {
        let Some(owner) = owner else {
            return;
        };
        for Parent { field, entity } in parents {
            let Some(parent_owner) = entity.user_id.as_ref() else {
                continue;
            };
            if parent_owner == owner {
                continue;
            }
            if self.policy.enforce_tenant_consistency {
                errors.push(ValidationError::OwnershipMismatch {
                    field: (*field).to_string(),
                    owner: Some(owner.clone()),
                    referenced: Some(parent_owner.clone()),
                });
            } else {
                tracing::warn!(
                    %owner,
                    referenced = %parent_owner,
                    field,
                    parent_id = %entity.id,
                    "reference crosses tenants"
                );
            }
        }
    }
}

/// A resolved, live parent and the field that references it.
struct Parent {
    field: &'static str,
    entity: Entity,
}

/// A foreign key to resolve.
#[derive(Debug, Clone, Copy)]
struct Reference {
    field: &'static str,
    target: EntityKind,
    id: EntityId,
}

impl Reference {
    fn unresolved(&self, reason: UnresolvedReason) -> TerrariumError {
        ValidationError::from(ReferentialIntegrityError {
            field: self.field.to_string(),
            target: self.target,
            id: self.id,
            reason,
        })
        .into()
    }
}

fn references_of(kind: EntityKind, keys: Vec<(&'static str, EntityId)>) -> Vec<Reference> {
    let schema = schema::describe(kind);
    keys.into_iter()
        .filter_map(|(field, id)| {
            let target = schema.field(field)?.field_type.reference()?;
            Some(Reference { field, target, id })
        })
        .collect()
}
