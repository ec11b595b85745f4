//! Weight log — a point-in-time weight measurement.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityData, EntityKind, Fields, Record};
use crate::id::ReptileId;
use crate::time::Timestamp;

/// One weighing of a reptile, in grams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReptileWeightLog {
    pub weight: f64,
    pub metering_date_time: Timestamp,
    #[serde(rename = "reptileID")]
    pub reptile_id: ReptileId,
}

impl ReptileWeightLog {
    #[must_use]
    pub fn new(reptile_id: ReptileId, weight: f64, metering_date_time: Timestamp) -> Self {
        Self {
            weight,
            metering_date_time,
            reptile_id,
        }
    }
}

impl Record for ReptileWeightLog {
    const KIND: EntityKind = EntityKind::ReptileWeightLog;

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("weight", self.weight)
            .with("meteringDateTime", self.metering_date_time)
            .with("reptileID", self.reptile_id)
    }

    fn from_data(data: &EntityData) -> Option<&Self> {
        match data {
            EntityData::ReptileWeightLog(record) => Some(record),
            _ => None,
        }
    }
}
