//! Entities — the seven record types and the envelope they are stored in.
//!
//! Every stored [`Entity`] carries identity, ownership, timestamps, a
//! storage-managed version counter and a tombstone flag around one of the
//! typed records in [`EntityData`].

mod environment_log;
mod feeding_box;
mod feeding_log;
mod fields;
mod reptile;
mod reptile_type;
mod slot;
mod weight_log;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownEntityError;
use crate::id::{EntityId, UserId};
use crate::schema;
use crate::time::{self, Timestamp};
use crate::value::FieldValue;

pub use environment_log::ReptileTemperatureAndHumidityLog;
pub use feeding_box::ReptileFeedingBox;
pub use feeding_log::ReptileFeedingLog;
pub use fields::Fields;
pub use reptile::{Reptile, ReptileBuilder};
pub use reptile_type::ReptileType;
pub use slot::ReptileFeedingBoxIndexCollection;
pub use weight_log::ReptileWeightLog;

/// Monotonic per-entity version, starting at 1 on creation.
pub type Version = u64;

/// The seven entity types of the husbandry model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    ReptileType,
    ReptileFeedingBox,
    ReptileFeedingBoxIndexCollection,
    Reptile,
    ReptileWeightLog,
    ReptileFeedingLog,
    ReptileTemperatureAndHumidityLog,
}

impl EntityKind {
    pub const ALL: [Self; 7] = [
        Self::ReptileType,
        Self::ReptileFeedingBox,
        Self::ReptileFeedingBoxIndexCollection,
        Self::Reptile,
        Self::ReptileWeightLog,
        Self::ReptileFeedingLog,
        Self::ReptileTemperatureAndHumidityLog,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReptileType => "ReptileType",
            Self::ReptileFeedingBox => "ReptileFeedingBox",
            Self::ReptileFeedingBoxIndexCollection => "ReptileFeedingBoxIndexCollection",
            Self::Reptile => "Reptile",
            Self::ReptileWeightLog => "ReptileWeightLog",
            Self::ReptileFeedingLog => "ReptileFeedingLog",
            Self::ReptileTemperatureAndHumidityLog => "ReptileTemperatureAndHumidityLog",
        }
    }

    /// Whether this kind is one of the append-only log types.
    #[must_use]
    pub fn is_log(self) -> bool {
        self.event_time_field().is_some()
    }

    /// The measurement or event timestamp a log kind is ordered by.
    #[must_use]
    pub fn event_time_field(self) -> Option<&'static str> {
        match self {
            Self::ReptileWeightLog | Self::ReptileTemperatureAndHumidityLog => {
                Some("meteringDateTime")
            }
            Self::ReptileFeedingLog => Some("feedingDateTime"),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = UnknownEntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEntityError {
                name: s.to_string(),
            })
    }
}

/// A typed record that can be stored as [`EntityData`].
pub trait Record: Sized {
    const KIND: EntityKind;

    /// Untyped view of the record, keyed by wire field names.
    fn to_fields(&self) -> Fields;

    /// Borrow the record out of the matching [`EntityData`] variant.
    fn from_data(data: &EntityData) -> Option<&Self>;
}

/// The typed payload of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fields")]
pub enum EntityData {
    ReptileType(ReptileType),
    ReptileFeedingBox(ReptileFeedingBox),
    ReptileFeedingBoxIndexCollection(ReptileFeedingBoxIndexCollection),
    Reptile(Reptile),
    ReptileWeightLog(ReptileWeightLog),
    ReptileFeedingLog(ReptileFeedingLog),
    ReptileTemperatureAndHumidityLog(ReptileTemperatureAndHumidityLog),
}

impl EntityData {
    /// Decode a record of `kind` from wire fields.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when a field is missing
    /// or has the wrong shape.
    pub fn from_fields(kind: EntityKind, fields: Fields) -> Result<Self, serde_json::Error> {
        let value = serde_json::Value::Object(fields.into_inner());
        Ok(match kind {
            EntityKind::ReptileType => Self::ReptileType(serde_json::from_value(value)?),
            EntityKind::ReptileFeedingBox => {
                Self::ReptileFeedingBox(serde_json::from_value(value)?)
            }
            EntityKind::ReptileFeedingBoxIndexCollection => {
                Self::ReptileFeedingBoxIndexCollection(serde_json::from_value(value)?)
            }
            EntityKind::Reptile => Self::Reptile(serde_json::from_value(value)?),
            EntityKind::ReptileWeightLog => Self::ReptileWeightLog(serde_json::from_value(value)?),
            EntityKind::ReptileFeedingLog => {
                Self::ReptileFeedingLog(serde_json::from_value(value)?)
            }
            EntityKind::ReptileTemperatureAndHumidityLog => {
                Self::ReptileTemperatureAndHumidityLog(serde_json::from_value(value)?)
            }
        })
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::ReptileType(_) => EntityKind::ReptileType,
            Self::ReptileFeedingBox(_) => EntityKind::ReptileFeedingBox,
            Self::ReptileFeedingBoxIndexCollection(_) => {
                EntityKind::ReptileFeedingBoxIndexCollection
            }
            Self::Reptile(_) => EntityKind::Reptile,
            Self::ReptileWeightLog(_) => EntityKind::ReptileWeightLog,
            Self::ReptileFeedingLog(_) => EntityKind::ReptileFeedingLog,
            Self::ReptileTemperatureAndHumidityLog(_) => {
                EntityKind::ReptileTemperatureAndHumidityLog
            }
        }
    }

    #[must_use]
    pub fn to_fields(&self) -> Fields {
        match self {
            Self::ReptileType(record) => record.to_fields(),
            Self::ReptileFeedingBox(record) => record.to_fields(),
            Self::ReptileFeedingBoxIndexCollection(record) => record.to_fields(),
            Self::Reptile(record) => record.to_fields(),
            Self::ReptileWeightLog(record) => record.to_fields(),
            Self::ReptileFeedingLog(record) => record.to_fields(),
            Self::ReptileTemperatureAndHumidityLog(record) => record.to_fields(),
        }
    }

    /// Every foreign key held by this record, as `(field, target id)` pairs in
    /// declaration order.
    #[must_use]
    pub fn foreign_keys(&self) -> Vec<(&'static str, EntityId)> {
        match self {
            Self::ReptileType(_) | Self::ReptileFeedingBox(_) => Vec::new(),
            Self::ReptileFeedingBoxIndexCollection(slot) => {
                vec![("reptileFeedingBoxID", slot.feeding_box_id.into())]
            }
            Self::Reptile(reptile) => vec![
                ("reptileTypeID", reptile.reptile_type_id.into()),
                ("reptileFeedingBoxID", reptile.feeding_box_id.into()),
                ("reptileFeedingBoxIndexCollectionID", reptile.slot_id.into()),
            ],
            Self::ReptileWeightLog(log) => vec![("reptileID", log.reptile_id.into())],
            Self::ReptileFeedingLog(log) => vec![("reptileID", log.reptile_id.into())],
            Self::ReptileTemperatureAndHumidityLog(log) => {
                vec![("reptileID", log.reptile_id.into())]
            }
        }
    }

    /// The foreign key stored under `field`, if this record has one.
    #[must_use]
    pub fn foreign_key(&self, field: &str) -> Option<EntityId> {
        self.foreign_keys()
            .into_iter()
            .find_map(|(name, id)| (name == field).then_some(id))
    }

    /// The measurement or event time of a log record.
    #[must_use]
    pub fn event_time(&self) -> Option<Timestamp> {
        match self {
            Self::ReptileWeightLog(log) => Some(log.metering_date_time),
            Self::ReptileFeedingLog(log) => Some(log.feeding_date_time),
            Self::ReptileTemperatureAndHumidityLog(log) => Some(log.metering_date_time),
            _ => None,
        }
    }
}

/// A stored entity: identity, ownership, lifecycle metadata and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "userID")]
    pub user_id: Option<UserId>,
    pub version: Version,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Tombstone marker; deleted entities keep their identity.
    pub deleted: bool,
    pub data: EntityData,
}

impl Entity {
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Borrow the payload as a concrete record type.
    #[must_use]
    pub fn data_as<T: Record>(&self) -> Option<&T> {
        T::from_data(&self.data)
    }

    /// The next version of this entity, marked as deleted.
    #[must_use]
    pub fn tombstoned(self) -> Self {
        Self {
            version: self.version + 1,
            updated_at: time::advance(self.updated_at),
            deleted: true,
            ..self
        }
    }

    /// Decoded value of a queryable field, meta fields included.
    ///
    /// Returns `None` for unknown fields and for unset optional fields.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            schema::ID => return Some(self.id.into()),
            schema::USER_ID => return self.user_id.as_ref().map(FieldValue::from),
            schema::CREATED_AT => return Some(self.created_at.into()),
            schema::UPDATED_AT => return Some(self.updated_at.into()),
            _ => {}
        }
        let def = schema::describe(self.kind()).field(name)?;
        let fields = self.data.to_fields();
        let raw = fields.get(name)?;
        def.field_type.decode(raw).ok()
    }
}
