//! Slot — an addressable coordinate within a feeding box.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityData, EntityKind, Fields, Record};
use crate::id::FeedingBoxId;

/// A `(vertical, horizontal)` position inside a feeding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReptileFeedingBoxIndexCollection {
    pub vertical_index: i64,
    pub horizontal_index: i64,
    #[serde(rename = "reptileFeedingBoxID")]
    pub feeding_box_id: FeedingBoxId,
}

impl ReptileFeedingBoxIndexCollection {
    #[must_use]
    pub fn new(feeding_box_id: FeedingBoxId, vertical_index: i64, horizontal_index: i64) -> Self {
        Self {
            vertical_index,
            horizontal_index,
            feeding_box_id,
        }
    }
}

impl Record for ReptileFeedingBoxIndexCollection {
    const KIND: EntityKind = EntityKind::ReptileFeedingBoxIndexCollection;

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("verticalIndex", self.vertical_index)
            .with("horizontalIndex", self.horizontal_index)
            .with("reptileFeedingBoxID", self.feeding_box_id)
    }

    fn from_data(data: &EntityData) -> Option<&Self> {
        match data {
            EntityData::ReptileFeedingBoxIndexCollection(record) => Some(record),
            _ => None,
        }
    }
}
