//! Error types used across the workspace.
//!
//! Expected domain conditions (bad input, lost races, missing targets) are
//! structured values; only unknown entity types and provider failures are
//! faults. Each adapter defines its own error enum and converts into
//! [`TerrariumError::Storage`].

use std::fmt;

use crate::entity::{EntityKind, Version};
use crate::id::{EntityId, FeedingBoxId, ReptileId, SlotId, UserId};
use crate::schema::{Constraint, FieldType};

/// Top-level error returned by services and storage providers.
#[derive(Debug, thiserror::Error)]
pub enum TerrariumError {
    #[error(transparent)]
    UnknownEntity(#[from] UnknownEntityError),

    #[error(transparent)]
    UnknownField(#[from] UnknownFieldError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    SubscriptionLagged(#[from] SubscriptionLagged),

    /// The storage provider failed or is unavailable.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TerrariumError {
    /// The validation failures carried by this error, if any.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            Self::Validation(errors) => Some(errors.as_slice()),
            _ => None,
        }
    }
}

/// Metadata was requested for an entity type that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity type `{name}`")]
pub struct UnknownEntityError {
    pub name: String,
}

/// A query named a field the entity type does not declare.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} has no field `{field}`")]
pub struct UnknownFieldError {
    pub kind: EntityKind,
    pub field: String,
}

/// A read, update or delete target does not exist or was tombstoned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} {id} not found")]
pub struct NotFoundError {
    pub kind: EntityKind,
    pub id: EntityId,
}

/// A write lost a concurrency race or collided with an existing identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    /// The stored version advanced past the base the caller observed.
    #[error("{kind} {id} is at version {actual}, update was based on {expected}")]
    StaleVersion {
        kind: EntityKind,
        id: EntityId,
        expected: Version,
        actual: Version,
    },

    /// A client-supplied id is already taken by different content.
    #[error("{kind} {id} already exists with different content")]
    DuplicateId { kind: EntityKind, id: EntityId },
}

/// A change subscriber fell behind and events were dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("change subscription lagged, {skipped} events skipped")]
pub struct SubscriptionLagged {
    pub skipped: u64,
}

/// Why a foreign key failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    Missing,
    Tombstoned,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Missing => "does not exist",
            Self::Tombstoned => "was deleted",
        })
    }
}

/// A foreign key does not resolve to a live entity of the declared kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{field}` references {target} {id} which {reason}")]
pub struct ReferentialIntegrityError {
    pub field: String,
    pub target: EntityKind,
    pub id: EntityId,
    pub reason: UnresolvedReason,
}

/// One field-level or reference-level problem found before any write.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("`{field}` is required")]
    MissingField { field: String },

    #[error("`{field}` must reference a {target}")]
    MissingReference { field: String, target: EntityKind },

    #[error("`{field}` expects {expected}")]
    TypeMismatch { field: String, expected: FieldType },

    #[error("`{field}` must be one of {}, got `{value}`", .allowed.join(", "))]
    InvalidEnumMember {
        field: String,
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("`{field}` {constraint}")]
    ConstraintViolated {
        field: String,
        constraint: Constraint,
    },

    #[error("{kind} has no field `{field}`")]
    UnknownField { kind: EntityKind, field: String },

    #[error("`{field}` is read-only")]
    ReadOnlyField { field: String },

    #[error("`{field}` of a log entry cannot change once recorded")]
    LogTimestampLocked { field: String },

    #[error(transparent)]
    ReferentialIntegrity(#[from] ReferentialIntegrityError),

    #[error("lookup of `{field}` was cancelled")]
    LookupCancelled { field: String },

    #[error("{kind} input could not be decoded: {message}")]
    Malformed { kind: EntityKind, message: String },

    #[error("slot {slot} belongs to box {slot_box}, not {reptile_box}")]
    SlotBoxMismatch {
        slot: SlotId,
        slot_box: FeedingBoxId,
        reptile_box: FeedingBoxId,
    },

    #[error("slot {slot} is already occupied by reptile {occupant}")]
    SlotOccupied { slot: SlotId, occupant: ReptileId },

    #[error("`{field}` references an entity owned by another user")]
    OwnershipMismatch {
        field: String,
        owner: Option<UserId>,
        referenced: Option<UserId>,
    },
}

impl ValidationError {
    /// The field this error is about, when it concerns a single field.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field }
            | Self::MissingReference { field, .. }
            | Self::TypeMismatch { field, .. }
            | Self::InvalidEnumMember { field, .. }
            | Self::ConstraintViolated { field, .. }
            | Self::UnknownField { field, .. }
            | Self::ReadOnlyField { field }
            | Self::LogTimestampLocked { field }
            | Self::LookupCancelled { field }
            | Self::OwnershipMismatch { field, .. } => Some(field.as_str()),
            Self::ReferentialIntegrity(err) => Some(err.field.as_str()),
            Self::Malformed { .. } | Self::SlotBoxMismatch { .. } | Self::SlotOccupied { .. } => {
                None
            }
        }
    }
}

/// A non-empty, itemized list of validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("validation failed: {}", render(.0))]
pub struct ValidationErrors(Vec<ValidationError>);

fn render(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    /// Wrap a list of failures; `None` when the list is empty.
    #[must_use]
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        (!errors.is_empty()).then_some(Self(errors))
    }

    #[must_use]
    pub fn single(error: ValidationError) -> Self {
        Self(vec![error])
    }

    #[must_use]
    pub fn as_slice(&self) -> &[ValidationError] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self::single(error)
    }
}

impl From<ValidationError> for TerrariumError {
    fn from(error: ValidationError) -> Self {
        Self::Validation(ValidationErrors::single(error))
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_refuse_to_wrap_empty_error_list() {
        assert!(ValidationErrors::from_vec(Vec::new()).is_none());
    }

    #[test]
    fn should_render_every_error_in_message() {
        let errors = ValidationErrors::from_vec(vec![
            ValidationError::MissingField {
                field: "name".to_string(),
            },
            ValidationError::ReadOnlyField {
                field: "createdAt".to_string(),
            },
        ])
        .unwrap();
        assert_eq!(
            errors.to_string(),
            "validation failed: `name` is required; `createdAt` is read-only"
        );
    }

    #[test]
    fn should_name_the_field_of_a_referential_error() {
        let err = ValidationError::from(ReferentialIntegrityError {
            field: "reptileID".to_string(),
            target: EntityKind::Reptile,
            id: EntityId::new(),
            reason: UnresolvedReason::Tombstoned,
        });
        assert_eq!(err.field(), Some("reptileID"));
        assert!(err.to_string().ends_with("was deleted"));
    }

    #[test]
    fn should_list_allowed_members_for_enum_errors() {
        let err = ValidationError::InvalidEnumMember {
            field: "kind".to_string(),
            value: "CRATE".to_string(),
            allowed: &["BOX", "CABINET"],
        };
        assert_eq!(
            err.to_string(),
            "`kind` must be one of BOX, CABINET, got `CRATE`"
        );
    }

    #[test]
    fn should_expose_validation_errors_from_top_level_error() {
        let err = TerrariumError::from(ValidationError::MissingField {
            field: "name".to_string(),
        });
        assert_eq!(err.validation_errors().map(<[_]>::len), Some(1));
        let not_found = TerrariumError::from(NotFoundError {
            kind: EntityKind::Reptile,
            id: EntityId::new(),
        });
        assert!(not_found.validation_errors().is_none());
    }
}
