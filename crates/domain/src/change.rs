//! Change notifications pushed by a storage provider.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind};
use crate::id::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    /// The entity was tombstoned; the carried snapshot has `deleted` set.
    Deleted,
}

/// A committed write, carrying the entity as stored after the write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub entity: Entity,
}

impl ChangeEvent {
    #[must_use]
    pub fn created(entity: Entity) -> Self {
        Self {
            kind: ChangeKind::Created,
            entity,
        }
    }

    #[must_use]
    pub fn updated(entity: Entity) -> Self {
        Self {
            kind: ChangeKind::Updated,
            entity,
        }
    }

    #[must_use]
    pub fn deleted(entity: Entity) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            entity,
        }
    }

    #[must_use]
    pub fn entity_kind(&self) -> EntityKind {
        self.entity.kind()
    }

    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.entity.id
    }
}
