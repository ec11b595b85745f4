//! Feeding log — a feeding event with the conditions it happened in.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityData, EntityKind, Fields, Record};
use crate::id::ReptileId;
use crate::time::Timestamp;

/// One feeding of a reptile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReptileFeedingLog {
    /// Weight of the food offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_temperature: Option<f64>,
    pub feeding_date_time: Timestamp,
    #[serde(rename = "reptileID")]
    pub reptile_id: ReptileId,
}

impl ReptileFeedingLog {
    /// A feeding with no measurements attached.
    #[must_use]
    pub fn new(reptile_id: ReptileId, feeding_date_time: Timestamp) -> Self {
        Self {
            weight: None,
            detail: None,
            environment_humidity: None,
            environment_temperature: None,
            feeding_date_time,
            reptile_id,
        }
    }
}

impl Record for ReptileFeedingLog {
    const KIND: EntityKind = EntityKind::ReptileFeedingLog;

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with_opt("weight", self.weight)
            .with_opt("detail", self.detail.clone())
            .with_opt("environmentHumidity", self.environment_humidity)
            .with_opt("environmentTemperature", self.environment_temperature)
            .with("feedingDateTime", self.feeding_date_time)
            .with("reptileID", self.reptile_id)
    }

    fn from_data(data: &EntityData) -> Option<&Self> {
        match data {
            EntityData::ReptileFeedingLog(record) => Some(record),
            _ => None,
        }
    }
}
