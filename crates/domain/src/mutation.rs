//! Update-by-copy input: field changes described relative to an observed base.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::Fields;
use crate::value::FieldValue;

/// A set of field assignments applied to a snapshot to produce its next
/// version.
///
/// Assigning `null` clears an optional field. A mutation never touches a live
/// entity; it is validated against a base and submitted together with the
/// version that base was read at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    changes: Fields,
    /// Allows a log's event timestamp to change.
    #[serde(default)]
    correction: bool,
}

impl Mutation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.changes.insert(field, value.into());
        self
    }

    /// Assign a raw JSON value, as received from a presentation layer.
    #[must_use]
    pub fn set_json(mut self, field: impl Into<String>, value: Value) -> Self {
        self.changes = self.changes.with_json(field, value);
        self
    }

    /// Clear an optional field.
    #[must_use]
    pub fn clear(self, field: impl Into<String>) -> Self {
        self.set_json(field, Value::Null)
    }

    /// Mark this mutation as a deliberate correction of a log entry.
    #[must_use]
    pub fn as_correction(mut self) -> Self {
        self.correction = true;
        self
    }

    #[must_use]
    pub fn is_correction(&self) -> bool {
        self.correction
    }

    #[must_use]
    pub fn changes(&self) -> &Fields {
        &self.changes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Whether `field` is assigned by this mutation.
    #[must_use]
    pub fn touches(&self, field: &str) -> bool {
        self.changes.contains(field)
    }

    /// Copy `base` and apply every change on top of it. `null` removes the
    /// field from the copy.
    #[must_use]
    pub fn apply_to(&self, base: &Fields) -> Fields {
        let mut merged = base.clone();
        for (name, value) in self.changes.iter() {
            if value.is_null() {
                merged.remove(name);
            } else {
                merged = merged.with_json(name.clone(), value.clone());
            }
        }
        merged
    }
}

impl From<Fields> for Mutation {
    fn from(changes: Fields) -> Self {
        Self {
            changes,
            correction: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_overlay_changes_on_a_copy_of_the_base() {
        let base = Fields::new().with("name", "Spot").with("nickname", "Spotty");
        let mutation = Mutation::new().set("name", "Dot").clear("nickname");

        let merged = mutation.apply_to(&base);

        assert_eq!(merged.get("name"), Some(&Value::from("Dot")));
        assert!(!merged.contains("nickname"));
        assert_eq!(base.get("name"), Some(&Value::from("Spot")));
    }

    #[test]
    fn should_not_be_a_correction_by_default() {
        let mutation = Mutation::new().set("weight", 41.0);
        assert!(!mutation.is_correction());
        assert!(mutation.touches("weight"));
        assert!(Mutation::new().as_correction().is_correction());
    }

    #[test]
    fn should_deserialize_without_correction_flag() {
        let mutation: Mutation =
            serde_json::from_str(r#"{"changes": {"weight": 12.5}}"#).unwrap();
        assert!(!mutation.is_correction());
        assert!(!mutation.is_empty());
    }
}
