//! Relation service — navigation along foreign keys in both directions.
//!
//! Reverse collections are never stored. They are derived on demand by
//! listing the owning kind filtered on its foreign key.

use futures::TryStreamExt;
use terrarium_domain::entity::{Entity, EntityKind};
use terrarium_domain::error::{TerrariumError, UnknownFieldError};
use terrarium_domain::id::EntityId;
use terrarium_domain::query::{Predicate, Query};
use terrarium_domain::schema::{self, Direction};

use crate::ports::StorageProvider;

/// Application service resolving parents and derived child collections.
pub struct RelationService<S> {
    storage: S,
}

impl<S: StorageProvider> RelationService<S> {
    /// Create a new service backed by the given storage.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Live entities in the reverse collection `relation` of a parent, such
    /// as the `reptiles` of a feeding box.
    ///
    /// # Errors
    ///
    /// Returns [`TerrariumError::UnknownField`] when `parent_kind` has no
    /// incoming relation called `relation`, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn children(
        &self,
        parent_kind: EntityKind,
        parent_id: EntityId,
        relation: &str,
    ) -> Result<Vec<Entity>, TerrariumError> {
        let relation = schema::relations_of(parent_kind)
            .into_iter()
            .find(|r| r.direction == Direction::Incoming && r.name == relation)
            .ok_or_else(|| UnknownFieldError {
                kind: parent_kind,
                field: relation.to_string(),
            })?;
        let query = Query::new(relation.target)
            .filter(Predicate::all().eq(relation.field, parent_id));
        self.storage.list(query).try_collect().await
    }

    /// The live parent `child` references through `field`.
    ///
    /// # Errors
    ///
    /// Returns [`TerrariumError::UnknownField`] when `field` is not a foreign
    /// key of the child, [`TerrariumError::NotFound`] when the parent is
    /// missing or tombstoned, or a storage error.
    pub async fn parent(&self, child: &Entity, field: &str) -> Result<Entity, TerrariumError> {
        let unknown = || UnknownFieldError {
            kind: child.kind(),
            field: field.to_string(),
        };
        let target = schema::describe(child.kind())
            .field(field)
            .and_then(|def| def.field_type.reference())
            .ok_or_else(unknown)?;
        let id = child.data.foreign_key(field).ok_or_else(unknown)?;
        self.storage.get(target, id).await
    }
}
