//! Value types — enumerations and the scalar domain shared by the schema,
//! the validator and the query language.

mod container_kind;
mod field_value;
mod gender;

pub use container_kind::ContainerKind;
pub use field_value::FieldValue;
pub use gender::Gender;
