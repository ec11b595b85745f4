//! Untyped key/value input, as supplied by a presentation layer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::value::FieldValue;

/// Field values keyed by wire name (`reptileTypeID`, `meteringDateTime`, …).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(Map<String, Value>);

impl Fields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of a typed value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value.into());
        self
    }

    /// Builder-style insertion of an optional value; `None` leaves the field unset.
    #[must_use]
    pub fn with_opt<V: Into<FieldValue>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    /// Builder-style insertion of a raw JSON value.
    #[must_use]
    pub fn with_json(mut self, name: impl Into<String>, value: Value) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Fields {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Fields {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_typed_values_to_json() {
        let fields = Fields::new().with("name", "Spot").with("verticalIndex", 2_i64);
        assert_eq!(fields.get("name"), Some(&Value::from("Spot")));
        assert_eq!(fields.get("verticalIndex"), Some(&Value::from(2)));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn should_skip_unset_optional_values() {
        let fields = Fields::new().with_opt::<f64>("weight", None);
        assert!(fields.is_empty());
    }

    #[test]
    fn should_deserialize_from_plain_json_object() {
        let fields: Fields = serde_json::from_str(r#"{"name": "Rack A", "kind": "BOX"}"#).unwrap();
        assert!(fields.contains("kind"));
    }
}
