//! Reptile — an individually identified specimen.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityData, EntityKind, Fields, Record};
use crate::id::{FeedingBoxId, ReptileTypeId, SlotId};
use crate::value::{FieldValue, Gender};

/// An individual animal, housed in a slot of a feeding box.
///
/// The box is referenced directly as well as through the slot so box-level
/// queries do not need to go through slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reptile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
    /// Ordered lineage or trait tags (morph genes, het markers, …).
    #[serde(default)]
    pub genies: Vec<String>,
    #[serde(rename = "reptileTypeID")]
    pub reptile_type_id: ReptileTypeId,
    #[serde(rename = "reptileFeedingBoxID")]
    pub feeding_box_id: FeedingBoxId,
    #[serde(rename = "reptileFeedingBoxIndexCollectionID")]
    pub slot_id: SlotId,
}

impl Reptile {
    /// Start assembling creation input for a reptile.
    #[must_use]
    pub fn builder() -> ReptileBuilder {
        ReptileBuilder::default()
    }
}

impl Record for Reptile {
    const KIND: EntityKind = EntityKind::Reptile;

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("name", self.name.as_str())
            .with_opt("nickname", self.nickname.clone())
            .with("gender", self.gender)
            .with_opt("weight", self.weight)
            .with_opt("birthdate", self.birthdate)
            .with("genies", self.genies.clone())
            .with("reptileTypeID", self.reptile_type_id)
            .with("reptileFeedingBoxID", self.feeding_box_id)
            .with("reptileFeedingBoxIndexCollectionID", self.slot_id)
    }

    fn from_data(data: &EntityData) -> Option<&Self> {
        match data {
            EntityData::Reptile(record) => Some(record),
            _ => None,
        }
    }
}

/// Step-by-step builder for reptile creation input.
///
/// Produces untyped [`Fields`] rather than a [`Reptile`]: anything left unset
/// stays absent so the integrity validator can report it.
#[derive(Debug, Default)]
pub struct ReptileBuilder {
    fields: Fields,
}

impl ReptileBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.fields.insert("name", FieldValue::Text(name.into()));
        self
    }

    #[must_use]
    pub fn nickname(mut self, nickname: impl Into<String>) -> Self {
        self.fields.insert("nickname", FieldValue::Text(nickname.into()));
        self
    }

    #[must_use]
    pub fn gender(mut self, gender: Gender) -> Self {
        self.fields.insert("gender", gender.into());
        self
    }

    #[must_use]
    pub fn weight(mut self, weight: f64) -> Self {
        self.fields.insert("weight", weight.into());
        self
    }

    #[must_use]
    pub fn birthdate(mut self, birthdate: NaiveDate) -> Self {
        self.fields.insert("birthdate", birthdate.into());
        self
    }

    #[must_use]
    pub fn genie(mut self, genie: impl Into<String>) -> Self {
        let mut genies: Vec<String> = self
            .fields
            .get("genies")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();
        genies.push(genie.into());
        self.fields.insert("genies", genies.into());
        self
    }

    #[must_use]
    pub fn reptile_type_id(mut self, id: ReptileTypeId) -> Self {
        self.fields.insert("reptileTypeID", id.into());
        self
    }

    #[must_use]
    pub fn feeding_box_id(mut self, id: FeedingBoxId) -> Self {
        self.fields.insert("reptileFeedingBoxID", id.into());
        self
    }

    #[must_use]
    pub fn slot_id(mut self, id: SlotId) -> Self {
        self.fields.insert("reptileFeedingBoxIndexCollectionID", id.into());
        self
    }

    /// Consume the builder and return the assembled fields.
    #[must_use]
    pub fn build(self) -> Fields {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_leave_unset_references_absent() {
        let fields = Reptile::builder()
            .name("Spot")
            .gender(Gender::Unknown)
            .build();
        assert!(fields.contains("name"));
        assert!(!fields.contains("reptileTypeID"));
    }

    #[test]
    fn should_accumulate_genies_in_order() {
        let fields = Reptile::builder().genie("tremper").genie("het eclipse").build();
        assert_eq!(
            fields.get("genies"),
            Some(&serde_json::json!(["tremper", "het eclipse"]))
        );
    }

    #[test]
    fn should_default_missing_genies_to_empty_when_decoding() {
        let json = serde_json::json!({
            "name": "Spot",
            "gender": "MALE",
            "reptileTypeID": ReptileTypeId::new(),
            "reptileFeedingBoxID": FeedingBoxId::new(),
            "reptileFeedingBoxIndexCollectionID": SlotId::new(),
        });
        let reptile: Reptile = serde_json::from_value(json).unwrap();
        assert!(reptile.genies.is_empty());
        assert_eq!(reptile.gender, Gender::Male);
        assert!(reptile.weight.is_none());
    }
}
