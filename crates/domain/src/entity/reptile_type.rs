//! Reptile type — a taxonomic or species classification.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityData, EntityKind, Fields, Record};

/// A species or morph classification such as "Leopard Gecko".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReptileType {
    pub name: String,
}

impl ReptileType {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Record for ReptileType {
    const KIND: EntityKind = EntityKind::ReptileType;

    fn to_fields(&self) -> Fields {
        Fields::new().with("name", self.name.as_str())
    }

    fn from_data(data: &EntityData) -> Option<&Self> {
        match data {
            EntityData::ReptileType(record) => Some(record),
            _ => None,
        }
    }
}
