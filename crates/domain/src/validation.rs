//! Structural integrity rules.
//!
//! Everything that can be decided from the input alone: unknown and read-only
//! fields, required fields, types, enumeration membership, scalar constraints
//! and the log timestamp lock. Errors are accumulated. Resolving foreign keys
//! needs a storage lookup and is left to the caller.

use serde_json::Value;

use crate::entity::{Entity, EntityData, EntityKind, Fields};
use crate::error::{ValidationError, ValidationErrors};
use crate::id::{EntityId, UserId};
use crate::mutation::Mutation;
use crate::schema::{self, DecodeError, EntitySchema, FieldDef, FieldType};
use crate::value::FieldValue;

/// Creation input that passed every structural rule.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedCreate {
    /// Client-supplied identifier, for idempotent replays.
    pub id: Option<EntityId>,
    pub user_id: Option<UserId>,
    pub data: EntityData,
}

/// Update input that passed every structural rule.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedUpdate {
    pub user_id: Option<UserId>,
    pub data: EntityData,
    /// Foreign keys whose target differs from the base, in declaration order.
    pub changed_references: Vec<(&'static str, EntityId)>,
}

/// Check untyped creation input for `kind`.
///
/// `id` and `userID` may be supplied; `createdAt` and `updatedAt` may not.
///
/// # Errors
///
/// Returns every structural problem found in the input.
pub fn check_create(kind: EntityKind, input: &Fields) -> Result<CheckedCreate, ValidationErrors> {
    let mut errors = Vec::new();
    let mut id = None;
    let mut user_id = None;

    for (name, value) in input.iter() {
        match name.as_str() {
            schema::ID => match FieldType::Id.decode(value) {
                Ok(FieldValue::Id(value)) => id = Some(value),
                _ => errors.push(ValidationError::TypeMismatch {
                    field: name.clone(),
                    expected: FieldType::Id,
                }),
            },
            schema::USER_ID => match decode_user(value) {
                Ok(value) => user_id = value,
                Err(err) => errors.push(err),
            },
            schema::CREATED_AT | schema::UPDATED_AT => {
                errors.push(ValidationError::ReadOnlyField {
                    field: name.clone(),
                });
            }
            _ => {}
        }
    }

    check_data(kind, input, &mut errors);
    let data = decode(kind, input, errors)?;
    Ok(CheckedCreate { id, user_id, data })
}

/// Check a mutation against the snapshot it was based on.
///
/// Meta fields may be echoed back unchanged; changing `id`, `createdAt` or
/// `updatedAt` is rejected. For log kinds the event timestamp only changes
/// when the mutation is a correction.
///
/// # Errors
///
/// Returns every structural problem found in the mutation or in the merged
/// result.
pub fn check_update(base: &Entity, mutation: &Mutation) -> Result<CheckedUpdate, ValidationErrors> {
    let kind = base.kind();
    let mut errors = Vec::new();
    let mut user_id = base.user_id.clone();

    for (name, value) in mutation.changes().iter() {
        match name.as_str() {
            schema::ID | schema::CREATED_AT | schema::UPDATED_AT => {
                if base.field(name).as_ref() != decode_meta(name, value).as_ref() {
                    errors.push(ValidationError::ReadOnlyField {
                        field: name.clone(),
                    });
                }
            }
            schema::USER_ID => match decode_user(value) {
                Ok(value) => user_id = value,
                Err(err) => errors.push(err),
            },
            field if kind.event_time_field() == Some(field) && !mutation.is_correction() => {
                let current = base.data.event_time().map(FieldValue::Timestamp);
                let proposed = FieldType::Timestamp.decode(value).ok();
                if !same_value(current.as_ref(), proposed.as_ref()) {
                    errors.push(ValidationError::LogTimestampLocked {
                        field: name.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    let merged = mutation.apply_to(&base.data.to_fields());
    check_data(kind, &merged, &mut errors);
    let data = decode(kind, &merged, errors)?;

    let changed_references = data
        .foreign_keys()
        .into_iter()
        .filter(|(field, id)| {
            mutation.touches(field) && base.data.foreign_key(field) != Some(*id)
        })
        .collect();

    Ok(CheckedUpdate {
        user_id,
        data,
        changed_references,
    })
}

/// Check payload fields of `kind`, skipping meta fields.
fn check_data(kind: EntityKind, fields: &Fields, errors: &mut Vec<ValidationError>) {
    let schema = schema::describe(kind);

    for (name, _) in fields.iter() {
        if is_meta(name) {
            continue;
        }
        if !schema.data_fields.iter().any(|def| def.name == name) {
            errors.push(ValidationError::UnknownField {
                kind,
                field: name.clone(),
            });
        }
    }

    for def in schema.data_fields {
        match fields.get(def.name).filter(|value| !value.is_null()) {
            None if def.required => errors.push(missing(def)),
            None => {}
            Some(value) => {
                if let Err(err) = check_value(def, value) {
                    errors.push(err);
                }
            }
        }
    }
}

fn check_value(def: &FieldDef, value: &Value) -> Result<(), ValidationError> {
    let decoded = def.field_type.decode(value).map_err(|err| match err {
        DecodeError::NotAMember => ValidationError::InvalidEnumMember {
            field: def.name.to_string(),
            value: value.as_str().unwrap_or_default().to_string(),
            allowed: match def.field_type {
                FieldType::Enum(members) => members,
                _ => &[],
            },
        },
        DecodeError::WrongType => ValidationError::TypeMismatch {
            field: def.name.to_string(),
            expected: def.field_type,
        },
    })?;
    if def.constraint.check(&decoded) {
        Ok(())
    } else {
        Err(ValidationError::ConstraintViolated {
            field: def.name.to_string(),
            constraint: def.constraint,
        })
    }
}

fn missing(def: &FieldDef) -> ValidationError {
    match def.field_type.reference() {
        Some(target) => ValidationError::MissingReference {
            field: def.name.to_string(),
            target,
        },
        None => ValidationError::MissingField {
            field: def.name.to_string(),
        },
    }
}

/// Decode the typed record once the accumulated error list is known.
fn decode(
    kind: EntityKind,
    fields: &Fields,
    errors: Vec<ValidationError>,
) -> Result<EntityData, ValidationErrors> {
    if let Some(errors) = ValidationErrors::from_vec(errors) {
        return Err(errors);
    }
    EntityData::from_fields(kind, payload(schema::describe(kind), fields)).map_err(|err| {
        ValidationErrors::single(ValidationError::Malformed {
            kind,
            message: err.to_string(),
        })
    })
}

/// The declared, non-null payload fields.
fn payload(schema: &EntitySchema, fields: &Fields) -> Fields {
    schema
        .data_fields
        .iter()
        .filter_map(|def| {
            fields
                .get(def.name)
                .filter(|value| !value.is_null())
                .map(|value| (def.name.to_string(), value.clone()))
        })
        .collect()
}

fn is_meta(name: &str) -> bool {
    schema::META_FIELDS.iter().any(|def| def.name == name)
}

fn decode_meta(name: &str, value: &Value) -> Option<FieldValue> {
    let def = schema::META_FIELDS.iter().find(|def| def.name == name)?;
    def.field_type.decode(value).ok()
}

fn decode_user(value: &Value) -> Result<Option<UserId>, ValidationError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(UserId::new(s.as_str()))),
        _ => Err(ValidationError::TypeMismatch {
            field: schema::USER_ID.to_string(),
            expected: FieldType::Text,
        }),
    }
}

fn same_value(a: Option<&FieldValue>, b: Option<&FieldValue>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same_as(b),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Reptile, ReptileWeightLog};
    use crate::error::ValidationError as E;
    use crate::id::{FeedingBoxId, ReptileId, ReptileTypeId, SlotId};
    use crate::schema::Constraint;
    use crate::time::now;
    use crate::value::{ContainerKind, Gender};
    use chrono::TimeDelta;
    use serde_json::json;

    fn reptile_input() -> Fields {
        Reptile::builder()
            .name("Spot")
            .gender(Gender::Unknown)
            .reptile_type_id(ReptileTypeId::new())
            .feeding_box_id(FeedingBoxId::new())
            .slot_id(SlotId::new())
            .build()
    }

    fn stored(data: EntityData) -> Entity {
        let ts = now();
        Entity {
            id: EntityId::new(),
            user_id: Some(UserId::new("keeper")),
            version: 1,
            created_at: ts,
            updated_at: ts,
            deleted: false,
            data,
        }
    }

    fn stored_reptile() -> Entity {
        let data = EntityData::from_fields(
            EntityKind::Reptile,
            reptile_input().with("weight", 42.0),
        )
        .unwrap();
        stored(data)
    }

    #[test]
    fn should_accept_complete_reptile_input() {
        let checked = check_create(EntityKind::Reptile, &reptile_input()).unwrap();
        assert_eq!(checked.id, None);
        let reptile = match checked.data {
            EntityData::Reptile(reptile) => reptile,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(reptile.name, "Spot");
        assert!(reptile.genies.is_empty());
    }

    #[test]
    fn should_report_single_missing_reference_when_type_omitted() {
        let mut input = reptile_input();
        input.remove("reptileTypeID");

        let errors = check_create(EntityKind::Reptile, &input).unwrap_err();

        assert_eq!(
            errors.into_vec(),
            vec![E::MissingReference {
                field: "reptileTypeID".to_string(),
                target: EntityKind::ReptileType,
            }]
        );
    }

    #[test]
    fn should_accumulate_every_field_problem() {
        let input = Fields::new()
            .with_json("kind", json!("CRATE"))
            .with_json("name", json!("  "))
            .with_json("colour", json!("red"))
            .with_json("createdAt", json!("2024-01-01T00:00:00Z"));

        let errors = check_create(EntityKind::ReptileFeedingBox, &input)
            .unwrap_err()
            .into_vec();

        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&E::ReadOnlyField {
            field: "createdAt".to_string()
        }));
        assert!(errors.contains(&E::UnknownField {
            kind: EntityKind::ReptileFeedingBox,
            field: "colour".to_string()
        }));
        assert!(errors.contains(&E::InvalidEnumMember {
            field: "kind".to_string(),
            value: "CRATE".to_string(),
            allowed: ContainerKind::VARIANTS,
        }));
        assert!(errors.contains(&E::ConstraintViolated {
            field: "name".to_string(),
            constraint: Constraint::NonEmpty,
        }));
    }

    #[test]
    fn should_reject_wrong_types() {
        let input = Fields::new()
            .with_json("verticalIndex", json!("two"))
            .with_json("horizontalIndex", json!(3))
            .with("reptileFeedingBoxID", FeedingBoxId::new());

        let errors = check_create(EntityKind::ReptileFeedingBoxIndexCollection, &input)
            .unwrap_err()
            .into_vec();

        assert_eq!(
            errors,
            vec![E::TypeMismatch {
                field: "verticalIndex".to_string(),
                expected: FieldType::Integer,
            }]
        );
    }

    #[test]
    fn should_keep_client_supplied_id_and_owner() {
        let id = EntityId::new();
        let input = Fields::new()
            .with("name", "Leopard Gecko")
            .with("id", id)
            .with("userID", "keeper");

        let checked = check_create(EntityKind::ReptileType, &input).unwrap();

        assert_eq!(checked.id, Some(id));
        assert_eq!(checked.user_id, Some(UserId::new("keeper")));
    }

    #[test]
    fn should_reject_changed_identity_whatever_else_changes() {
        let base = stored_reptile();
        for field in ["id", "createdAt"] {
            let value = if field == "id" {
                json!(EntityId::new())
            } else {
                json!("2001-01-01T00:00:00Z")
            };
            let mutation = Mutation::new().set("name", "Dot").set_json(field, value);

            let errors = check_update(&base, &mutation).unwrap_err().into_vec();

            assert_eq!(
                errors,
                vec![E::ReadOnlyField {
                    field: field.to_string()
                }]
            );
        }
    }

    #[test]
    fn should_ignore_echoed_identity() {
        let base = stored_reptile();
        let mutation = Mutation::new()
            .set("id", base.id)
            .set("createdAt", base.created_at)
            .set("nickname", "Dotty");

        let checked = check_update(&base, &mutation).unwrap();

        assert!(checked.changed_references.is_empty());
        assert_eq!(checked.user_id, base.user_id);
    }

    #[test]
    fn should_list_only_changed_references() {
        let base = stored_reptile();
        let EntityData::Reptile(reptile) = &base.data else {
            unreachable!()
        };
        let new_slot = SlotId::new();
        let mutation = Mutation::new()
            .set("reptileTypeID", reptile.reptile_type_id)
            .set("reptileFeedingBoxIndexCollectionID", new_slot);

        let checked = check_update(&base, &mutation).unwrap();

        assert_eq!(
            checked.changed_references,
            vec![("reptileFeedingBoxIndexCollectionID", new_slot.into())]
        );
    }

    #[test]
    fn should_lock_log_event_time_unless_correcting() {
        let at = now();
        let base = stored(EntityData::ReptileWeightLog(ReptileWeightLog::new(
            ReptileId::new(),
            40.0,
            at,
        )));
        let moved = at - TimeDelta::hours(1);

        let errors = check_update(&base, &Mutation::new().set("meteringDateTime", moved))
            .unwrap_err()
            .into_vec();
        assert_eq!(
            errors,
            vec![E::LogTimestampLocked {
                field: "meteringDateTime".to_string()
            }]
        );

        let corrected =
            check_update(&base, &Mutation::new().set("meteringDateTime", moved).as_correction())
                .unwrap();
        assert_eq!(corrected.data.event_time(), Some(moved));

        assert!(check_update(&base, &Mutation::new().set("weight", 41.0)).is_ok());
    }

    #[test]
    fn should_clear_optional_fields_and_reject_clearing_required_ones() {
        let base = stored_reptile();

        let cleared = check_update(&base, &Mutation::new().clear("weight")).unwrap();
        let EntityData::Reptile(reptile) = cleared.data else {
            unreachable!()
        };
        assert_eq!(reptile.weight, None);

        let errors = check_update(&base, &Mutation::new().clear("name"))
            .unwrap_err()
            .into_vec();
        assert_eq!(
            errors,
            vec![E::MissingField {
                field: "name".to_string()
            }]
        );
    }
}
