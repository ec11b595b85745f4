//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete storage
//! engines.

pub mod entity_service;
pub mod integrity_audit;
pub mod relation_service;

pub use entity_service::{EntityService, RetryPolicy};
pub use integrity_audit::{DanglingReference, IntegrityAudit};
pub use relation_service::RelationService;
