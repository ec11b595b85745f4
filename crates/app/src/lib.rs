//! # terrarium-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that storage engines and hosts implement:
//!   - `StorageProvider` — get, paged query, create, update, delete, subscribe
//!   - `IdentityProvider` — the current user attached to new records
//! - Own the **integrity validator**, the only path from untyped input to a
//!   value a provider will accept
//! - Define **use-case services**:
//!   - `EntityService` — create, read, list, update-by-copy, delete, history
//!   - `RelationService` — parents and derived reverse collections
//!   - `IntegrityAudit` — dangling references left by tombstones
//! - Provide **in-process infrastructure** that doesn't need IO: the change
//!   feed and reverse-relation projections
//!
//! ## Dependency rule
//! Depends on `terrarium-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod change_feed;
pub mod ports;
pub mod projection;
pub mod services;
pub mod validator;

#[cfg(test)]
mod testing;
