//! # terrarium-adapter-storage-memory
//!
//! In-process storage engine, useful as a local cache and in tests.
//!
//! ## Responsibilities
//! - Implement the `StorageProvider` port defined in `terrarium-app::ports::storage`
//! - Serialize writes so change events are published in commit order
//! - Keep tombstones so deleted ids stay reserved
//!
//! ## Dependency rule
//! Depends on `terrarium-app` (for port traits) and `terrarium-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod error;
mod storage;

pub use error::MemoryError;
pub use storage::{DEFAULT_FEED_CAPACITY, MemoryStorage};
