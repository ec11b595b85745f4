//! # terrarium-domain
//!
//! Pure domain model for the terrarium husbandry data core.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Value types** (gender, container kind, the typed scalar domain)
//! - Define **Entities** (reptile types, feeding boxes, slots, reptiles and the three log kinds)
//! - Define the **Schema registry** (field sets, read-only fields, foreign-key edges, relations)
//! - Define the **Query language** (predicates, sorting, paging) and **Change events**
//! - Define **Mutations** (update-by-copy field changes)
//! - Enforce every structural integrity rule that needs no storage lookup
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod change;
pub mod entity;
pub mod mutation;
pub mod query;
pub mod schema;
pub mod validation;
pub mod value;
