//! # terrarium-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `StorageProvider` port defined in `terrarium-app::ports::storage`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain entities and database rows
//! - Publish committed writes on an in-process change feed
//!
//! ## Dependency rule
//! Depends on `terrarium-app` (for port traits) and `terrarium-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod pool;
pub mod storage;

pub use pool::{Config, Database};
pub use storage::SqliteStorage;
