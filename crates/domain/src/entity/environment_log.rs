//! Temperature and humidity log — an environmental reading next to a reptile.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityData, EntityKind, Fields, Record};
use crate::id::ReptileId;
use crate::time::Timestamp;

/// One environmental reading; temperature in °C, humidity in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReptileTemperatureAndHumidityLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_temperature: Option<f64>,
    pub metering_date_time: Timestamp,
    #[serde(rename = "reptileID")]
    pub reptile_id: ReptileId,
}

impl ReptileTemperatureAndHumidityLog {
    #[must_use]
    pub fn new(
        reptile_id: ReptileId,
        environment_temperature: Option<f64>,
        environment_humidity: Option<f64>,
        metering_date_time: Timestamp,
    ) -> Self {
        Self {
            environment_humidity,
            environment_temperature,
            metering_date_time,
            reptile_id,
        }
    }
}

impl Record for ReptileTemperatureAndHumidityLog {
    const KIND: EntityKind = EntityKind::ReptileTemperatureAndHumidityLog;

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with_opt("environmentHumidity", self.environment_humidity)
            .with_opt("environmentTemperature", self.environment_temperature)
            .with("meteringDateTime", self.metering_date_time)
            .with("reptileID", self.reptile_id)
    }

    fn from_data(data: &EntityData) -> Option<&Self> {
        match data {
            EntityData::ReptileTemperatureAndHumidityLog(record) => Some(record),
            _ => None,
        }
    }
}
