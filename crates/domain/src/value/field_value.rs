//! Typed field values used by predicates, sorting and decoded input.

use std::cmp::Ordering;

use chrono::{NaiveDate, SecondsFormat};
use serde::Serialize;

use crate::id::{EntityId, FeedingBoxId, ReptileId, ReptileTypeId, SlotId, UserId};
use crate::time::Timestamp;
use crate::value::{ContainerKind, Gender};

/// A single decoded field value.
///
/// Enumerations are carried as their wire text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Id(EntityId),
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(Timestamp),
    Date(NaiveDate),
    List(Vec<String>),
}

impl FieldValue {
    /// Order two values of the same domain.
    ///
    /// Integers and floats compare numerically with each other. Values from
    /// unrelated domains are incomparable and yield `None`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Id(a), Self::Id(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Integer(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::List(a), Self::List(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Whether both values are comparable and equal.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Id(id) => Self::String(id.to_string()),
            FieldValue::Text(text) => Self::String(text),
            FieldValue::Integer(n) => Self::from(n),
            FieldValue::Float(n) => Self::from(n),
            FieldValue::Timestamp(ts) => {
                Self::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FieldValue::Date(date) => Self::String(date.to_string()),
            FieldValue::List(items) => Self::Array(items.into_iter().map(Self::String).collect()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(value: Timestamp) -> Self {
        Self::Timestamp(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Gender> for FieldValue {
    fn from(value: Gender) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

impl From<ContainerKind> for FieldValue {
    fn from(value: ContainerKind) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

impl From<&UserId> for FieldValue {
    fn from(value: &UserId) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

macro_rules! id_into_field_value {
    ($($id:ty),*) => {
        $(
            impl From<$id> for FieldValue {
                fn from(value: $id) -> Self {
                    Self::Id(EntityId::from(value))
                }
            }
        )*
    };
}

id_into_field_value!(EntityId, ReptileTypeId, FeedingBoxId, SlotId, ReptileId);
