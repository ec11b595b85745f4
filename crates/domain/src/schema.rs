//! Entity & relationship registry.
//!
//! Static metadata describing, for every [`EntityKind`], its fields (type,
//! nullability, read-only status, constraint) and its foreign-key edges.
//! Consumed by validation and by query construction; no side effects.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::entity::EntityKind;
use crate::error::UnknownEntityError;
use crate::id::EntityId;
use crate::value::{ContainerKind, FieldValue, Gender};

pub const ID: &str = "id";
pub const USER_ID: &str = "userID";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Id,
    Text,
    Integer,
    Float,
    Timestamp,
    Date,
    TextList,
    /// Text restricted to the listed wire values.
    Enum(&'static [&'static str]),
    /// Foreign key to an entity of the given kind.
    Reference(EntityKind),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id => f.write_str("id"),
            Self::Text => f.write_str("text"),
            Self::Integer => f.write_str("integer"),
            Self::Float => f.write_str("number"),
            Self::Timestamp => f.write_str("RFC 3339 timestamp"),
            Self::Date => f.write_str("ISO 8601 date"),
            Self::TextList => f.write_str("list of text"),
            Self::Enum(members) => write!(f, "one of {}", members.join(", ")),
            Self::Reference(kind) => write!(f, "{kind} id"),
        }
    }
}

/// Why a raw value could not be decoded as its declared [`FieldType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    WrongType,
    NotAMember,
}

impl FieldType {
    /// Decode a raw JSON value into a typed [`FieldValue`].
    ///
    /// `null` never decodes; callers treat it as "absent".
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::NotAMember`] for text outside an enumeration and
    /// [`DecodeError::WrongType`] for any other shape mismatch.
    pub fn decode(&self, value: &Value) -> Result<FieldValue, DecodeError> {
        match (self, value) {
            (Self::Id | Self::Reference(_), Value::String(s)) => EntityId::from_str(s)
                .map(FieldValue::Id)
                .map_err(|_| DecodeError::WrongType),
            (Self::Text, Value::String(s)) => Ok(FieldValue::Text(s.clone())),
            (Self::Integer, Value::Number(n)) => n
                .as_i64()
                .map(FieldValue::Integer)
                .ok_or(DecodeError::WrongType),
            (Self::Float, Value::Number(n)) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(FieldValue::Float)
                .ok_or(DecodeError::WrongType),
            (Self::Timestamp, Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|ts| FieldValue::Timestamp(ts.to_utc()))
                .map_err(|_| DecodeError::WrongType),
            (Self::Date, Value::String(s)) => NaiveDate::from_str(s)
                .map(FieldValue::Date)
                .map_err(|_| DecodeError::WrongType),
            (Self::TextList, Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(FieldValue::List)
                .ok_or(DecodeError::WrongType),
            (Self::Enum(members), Value::String(s)) => {
                if members.contains(&s.as_str()) {
                    Ok(FieldValue::Text(s.clone()))
                } else {
                    Err(DecodeError::NotAMember)
                }
            }
            _ => Err(DecodeError::WrongType),
        }
    }

    /// The referenced kind, for foreign-key fields.
    #[must_use]
    pub fn reference(&self) -> Option<EntityKind> {
        match self {
            Self::Reference(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// Scalar constraint checked after a value has decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    None,
    /// Text with at least one non-whitespace character.
    NonEmpty,
    NonNegative,
    /// A number within `0..=100`.
    Percentage,
}

impl Constraint {
    /// Whether `value` satisfies this constraint.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn check(self, value: &FieldValue) -> bool {
        let number = match value {
            FieldValue::Integer(n) => Some(*n as f64),
            FieldValue::Float(n) => Some(*n),
            _ => None,
        };
        match (self, value, number) {
            (Self::None, _, _) => true,
            (Self::NonEmpty, FieldValue::Text(s), _) => !s.trim().is_empty(),
            (Self::NonNegative, _, Some(n)) => n >= 0.0,
            (Self::Percentage, _, Some(n)) => (0.0..=100.0).contains(&n),
            _ => false,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::NonEmpty => "must not be empty",
            Self::NonNegative => "must not be negative",
            Self::Percentage => "must be between 0 and 100",
        })
    }
}

/// Definition of one field of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    /// Identity and timestamps: never client-writable after creation.
    pub read_only: bool,
    pub constraint: Constraint,
}

impl FieldDef {
    const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: true,
            read_only: false,
            constraint: Constraint::None,
        }
    }

    const fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: false,
            read_only: false,
            constraint: Constraint::None,
        }
    }

    const fn read_only(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: true,
            read_only: true,
            constraint: Constraint::None,
        }
    }

    const fn constrained(mut self, constraint: Constraint) -> Self {
        self.constraint = constraint;
        self
    }
}

/// Fields shared by every entity.
pub const META_FIELDS: &[FieldDef] = &[
    FieldDef::read_only(ID, FieldType::Id),
    FieldDef::read_only(CREATED_AT, FieldType::Timestamp),
    FieldDef::read_only(UPDATED_AT, FieldType::Timestamp),
    FieldDef::optional(USER_ID, FieldType::Text),
];

const REPTILE_TYPE_FIELDS: &[FieldDef] =
    &[FieldDef::required("name", FieldType::Text).constrained(Constraint::NonEmpty)];

const FEEDING_BOX_FIELDS: &[FieldDef] = &[
    FieldDef::required("kind", FieldType::Enum(ContainerKind::VARIANTS)),
    FieldDef::required("name", FieldType::Text).constrained(Constraint::NonEmpty),
];

const SLOT_FIELDS: &[FieldDef] = &[
    FieldDef::required("verticalIndex", FieldType::Integer).constrained(Constraint::NonNegative),
    FieldDef::required("horizontalIndex", FieldType::Integer)
        .constrained(Constraint::NonNegative),
    FieldDef::required(
        "reptileFeedingBoxID",
        FieldType::Reference(EntityKind::ReptileFeedingBox),
    ),
];

const REPTILE_FIELDS: &[FieldDef] = &[
    FieldDef::required("name", FieldType::Text).constrained(Constraint::NonEmpty),
    FieldDef::optional("nickname", FieldType::Text),
    FieldDef::required("gender", FieldType::Enum(Gender::VARIANTS)),
    FieldDef::optional("weight", FieldType::Float).constrained(Constraint::NonNegative),
    FieldDef::optional("birthdate", FieldType::Date),
    FieldDef::optional("genies", FieldType::TextList),
    FieldDef::required(
        "reptileTypeID",
        FieldType::Reference(EntityKind::ReptileType),
    ),
    FieldDef::required(
        "reptileFeedingBoxID",
        FieldType::Reference(EntityKind::ReptileFeedingBox),
    ),
    FieldDef::required(
        "reptileFeedingBoxIndexCollectionID",
        FieldType::Reference(EntityKind::ReptileFeedingBoxIndexCollection),
    ),
];

const WEIGHT_LOG_FIELDS: &[FieldDef] = &[
    FieldDef::required("weight", FieldType::Float).constrained(Constraint::NonNegative),
    FieldDef::required("meteringDateTime", FieldType::Timestamp),
    FieldDef::required("reptileID", FieldType::Reference(EntityKind::Reptile)),
];

const FEEDING_LOG_FIELDS: &[FieldDef] = &[
    FieldDef::optional("weight", FieldType::Float).constrained(Constraint::NonNegative),
    FieldDef::optional("detail", FieldType::Text),
    FieldDef::optional("environmentHumidity", FieldType::Float)
        .constrained(Constraint::Percentage),
    FieldDef::optional("environmentTemperature", FieldType::Float),
    FieldDef::required("feedingDateTime", FieldType::Timestamp),
    FieldDef::required("reptileID", FieldType::Reference(EntityKind::Reptile)),
];

const ENVIRONMENT_LOG_FIELDS: &[FieldDef] = &[
    FieldDef::optional("environmentHumidity", FieldType::Float)
        .constrained(Constraint::Percentage),
    FieldDef::optional("environmentTemperature", FieldType::Float),
    FieldDef::required("meteringDateTime", FieldType::Timestamp),
    FieldDef::required("reptileID", FieldType::Reference(EntityKind::Reptile)),
];

/// Field list of one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    pub kind: EntityKind,
    /// Payload fields; the shared [`META_FIELDS`] are not repeated here.
    pub data_fields: &'static [FieldDef],
}

impl EntitySchema {
    /// Look up a field by wire name, meta fields included.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields().find(|def| def.name == name)
    }

    /// Every field: meta fields first, then payload fields.
    pub fn fields(&self) -> impl Iterator<Item = &'static FieldDef> + use<> {
        META_FIELDS.iter().chain(self.data_fields.iter())
    }

    /// Names of read-only fields.
    pub fn read_only_fields(&self) -> impl Iterator<Item = &'static str> + use<> {
        self.fields().filter(|def| def.read_only).map(|def| def.name)
    }

    /// Foreign-key fields in declaration order.
    pub fn references(&self) -> impl Iterator<Item = (&'static FieldDef, EntityKind)> + use<> {
        self.data_fields
            .iter()
            .filter_map(|def| def.field_type.reference().map(|target| (def, target)))
    }
}

static SCHEMAS: [EntitySchema; 7] = [
    EntitySchema {
        kind: EntityKind::ReptileType,
        data_fields: REPTILE_TYPE_FIELDS,
    },
    EntitySchema {
        kind: EntityKind::ReptileFeedingBox,
        data_fields: FEEDING_BOX_FIELDS,
    },
    EntitySchema {
        kind: EntityKind::ReptileFeedingBoxIndexCollection,
        data_fields: SLOT_FIELDS,
    },
    EntitySchema {
        kind: EntityKind::Reptile,
        data_fields: REPTILE_FIELDS,
    },
    EntitySchema {
        kind: EntityKind::ReptileWeightLog,
        data_fields: WEIGHT_LOG_FIELDS,
    },
    EntitySchema {
        kind: EntityKind::ReptileFeedingLog,
        data_fields: FEEDING_LOG_FIELDS,
    },
    EntitySchema {
        kind: EntityKind::ReptileTemperatureAndHumidityLog,
        data_fields: ENVIRONMENT_LOG_FIELDS,
    },
];

/// Field schema of `kind`.
#[must_use]
pub fn describe(kind: EntityKind) -> &'static EntitySchema {
    match kind {
        EntityKind::ReptileType => &SCHEMAS[0],
        EntityKind::ReptileFeedingBox => &SCHEMAS[1],
        EntityKind::ReptileFeedingBoxIndexCollection => &SCHEMAS[2],
        EntityKind::Reptile => &SCHEMAS[3],
        EntityKind::ReptileWeightLog => &SCHEMAS[4],
        EntityKind::ReptileFeedingLog => &SCHEMAS[5],
        EntityKind::ReptileTemperatureAndHumidityLog => &SCHEMAS[6],
    }
}

/// Field schema of the entity type called `name`.
///
/// # Errors
///
/// Returns [`UnknownEntityError`] when `name` is not a defined entity type.
pub fn describe_by_name(name: &str) -> Result<&'static EntitySchema, UnknownEntityError> {
    name.parse().map(describe)
}

/// A declared foreign-key edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub source: EntityKind,
    pub field: &'static str,
    pub target: EntityKind,
    /// Name of the owning side, seen from the source (`reptileType`).
    pub forward: &'static str,
    /// Name of the derived collection, seen from the target (`reptiles`).
    pub inverse: &'static str,
}

/// Every foreign key in the model. Reverse collections are derived from
/// this table; they are never stored.
pub const FOREIGN_KEYS: &[ForeignKey] = &[
    ForeignKey {
        source: EntityKind::ReptileFeedingBoxIndexCollection,
        field: "reptileFeedingBoxID",
        target: EntityKind::ReptileFeedingBox,
        forward: "reptileFeedingBox",
        inverse: "indexCollections",
    },
    ForeignKey {
        source: EntityKind::Reptile,
        field: "reptileTypeID",
        target: EntityKind::ReptileType,
        forward: "reptileType",
        inverse: "reptiles",
    },
    ForeignKey {
        source: EntityKind::Reptile,
        field: "reptileFeedingBoxID",
        target: EntityKind::ReptileFeedingBox,
        forward: "reptileFeedingBox",
        inverse: "reptiles",
    },
    ForeignKey {
        source: EntityKind::Reptile,
        field: "reptileFeedingBoxIndexCollectionID",
        target: EntityKind::ReptileFeedingBoxIndexCollection,
        forward: "reptileFeedingBoxIndexCollection",
        inverse: "reptiles",
    },
    ForeignKey {
        source: EntityKind::ReptileWeightLog,
        field: "reptileID",
        target: EntityKind::Reptile,
        forward: "reptile",
        inverse: "weightLogs",
    },
    ForeignKey {
        source: EntityKind::ReptileFeedingLog,
        field: "reptileID",
        target: EntityKind::Reptile,
        forward: "reptile",
        inverse: "feedingLogs",
    },
    ForeignKey {
        source: EntityKind::ReptileTemperatureAndHumidityLog,
        field: "reptileID",
        target: EntityKind::Reptile,
        forward: "reptile",
        inverse: "temperatureAndHumidityLogs",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Stored on this entity as a foreign-key field.
    Outgoing,
    /// Derived by querying the other entity's foreign key.
    Incoming,
}

/// One association of an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    pub direction: Direction,
    pub cardinality: Cardinality,
    /// The kind on the other end.
    pub target: EntityKind,
    /// The foreign-key field backing the relation. For incoming relations
    /// it lives on `target`.
    pub field: &'static str,
}

/// Outgoing then incoming relations of `kind`.
#[must_use]
pub fn relations_of(kind: EntityKind) -> Vec<Relation> {
    let outgoing = FOREIGN_KEYS
        .iter()
        .filter(|fk| fk.source == kind)
        .map(|fk| Relation {
            name: fk.forward,
            direction: Direction::Outgoing,
            cardinality: Cardinality::One,
            target: fk.target,
            field: fk.field,
        });
    let incoming = FOREIGN_KEYS
        .iter()
        .filter(|fk| fk.target == kind)
        .map(|fk| Relation {
            name: fk.inverse,
            direction: Direction::Incoming,
            cardinality: Cardinality::Many,
            target: fk.source,
            field: fk.field,
        });
    outgoing.chain(incoming).collect()
}

/// The foreign key on `child` pointing at `parent`, when exactly one exists.
#[must_use]
pub fn foreign_key_between(child: EntityKind, parent: EntityKind) -> Option<&'static ForeignKey> {
    let mut edges = FOREIGN_KEYS
        .iter()
        .filter(|fk| fk.source == child && fk.target == parent);
    let first = edges.next()?;
    edges.next().is_none().then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_describe_every_kind_with_meta_fields() {
        for kind in EntityKind::ALL {
            let schema = describe(kind);
            assert_eq!(schema.kind, kind);
            let read_only: Vec<_> = schema.read_only_fields().collect();
            assert_eq!(read_only, vec![ID, CREATED_AT, UPDATED_AT]);
            assert!(schema.field(USER_ID).is_some_and(|def| !def.required));
        }
    }

    #[test]
    fn should_fail_with_unknown_entity_when_describing_undefined_name() {
        let err = describe_by_name("Frog").unwrap_err();
        assert_eq!(err.name, "Frog");
        assert_eq!(
            describe_by_name("Reptile").unwrap().kind,
            EntityKind::Reptile
        );
    }

    #[test]
    fn should_list_reptile_references_in_declaration_order() {
        let targets: Vec<_> = describe(EntityKind::Reptile)
            .references()
            .map(|(def, target)| (def.name, target))
            .collect();
        assert_eq!(
            targets,
            vec![
                ("reptileTypeID", EntityKind::ReptileType),
                ("reptileFeedingBoxID", EntityKind::ReptileFeedingBox),
                (
                    "reptileFeedingBoxIndexCollectionID",
                    EntityKind::ReptileFeedingBoxIndexCollection
                ),
            ]
        );
    }

    #[test]
    fn should_derive_incoming_many_relations_for_feeding_box() {
        let relations = relations_of(EntityKind::ReptileFeedingBox);
        assert!(
            relations
                .iter()
                .all(|r| r.direction == Direction::Incoming && r.cardinality == Cardinality::Many)
        );
        let names: Vec<_> = relations.iter().map(|r| (r.name, r.target)).collect();
        assert_eq!(
            names,
            vec![
                ("indexCollections", EntityKind::ReptileFeedingBoxIndexCollection),
                ("reptiles", EntityKind::Reptile),
            ]
        );
    }

    #[test]
    fn should_report_both_directions_for_reptile() {
        let relations = relations_of(EntityKind::Reptile);
        let outgoing = relations
            .iter()
            .filter(|r| r.direction == Direction::Outgoing)
            .count();
        let incoming = relations
            .iter()
            .filter(|r| r.direction == Direction::Incoming)
            .count();
        assert_eq!(outgoing, 3);
        assert_eq!(incoming, 3);
    }

    #[test]
    fn should_find_unique_foreign_key_between_kinds() {
        let fk =
            foreign_key_between(EntityKind::ReptileWeightLog, EntityKind::Reptile).unwrap();
        assert_eq!(fk.field, "reptileID");
        assert!(foreign_key_between(EntityKind::Reptile, EntityKind::ReptileWeightLog).is_none());
    }

    #[test]
    fn should_decode_values_by_declared_type() {
        assert_eq!(
            FieldType::Integer.decode(&json!(3)),
            Ok(FieldValue::Integer(3))
        );
        assert_eq!(
            FieldType::Integer.decode(&json!(3.5)),
            Err(DecodeError::WrongType)
        );
        assert_eq!(
            FieldType::Float.decode(&json!(3)),
            Ok(FieldValue::Float(3.0))
        );
        assert_eq!(
            FieldType::Enum(Gender::VARIANTS).decode(&json!("FEMALE")),
            Err(DecodeError::NotAMember)
        );
        assert!(matches!(
            FieldType::Timestamp.decode(&json!("2024-03-01T10:00:00+02:00")),
            Ok(FieldValue::Timestamp(_))
        ));
        assert_eq!(
            FieldType::TextList.decode(&json!(["a", 1])),
            Err(DecodeError::WrongType)
        );
        assert_eq!(
            FieldType::Reference(EntityKind::Reptile).decode(&json!("nope")),
            Err(DecodeError::WrongType)
        );
        assert_eq!(FieldType::Text.decode(&Value::Null), Err(DecodeError::WrongType));
    }

    #[test]
    fn should_check_constraints() {
        assert!(!Constraint::NonEmpty.check(&FieldValue::from("   ")));
        assert!(Constraint::NonNegative.check(&FieldValue::Integer(0)));
        assert!(!Constraint::NonNegative.check(&FieldValue::Float(-0.5)));
        assert!(Constraint::Percentage.check(&FieldValue::Float(55.0)));
        assert!(!Constraint::Percentage.check(&FieldValue::Float(101.0)));
    }
}
