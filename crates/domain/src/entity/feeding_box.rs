//! Feeding box — a physical enclosure holding one or more slots.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityData, EntityKind, Fields, Record};
use crate::value::ContainerKind;

/// A box or cabinet on a rack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReptileFeedingBox {
    pub kind: ContainerKind,
    pub name: String,
}

impl ReptileFeedingBox {
    #[must_use]
    pub fn new(kind: ContainerKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl Record for ReptileFeedingBox {
    const KIND: EntityKind = EntityKind::ReptileFeedingBox;

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("kind", self.kind)
            .with("name", self.name.as_str())
    }

    fn from_data(data: &EntityData) -> Option<&Self> {
        match data {
            EntityData::ReptileFeedingBox(record) => Some(record),
            _ => None,
        }
    }
}
