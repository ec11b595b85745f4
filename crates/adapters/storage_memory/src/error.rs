//! Storage-specific error type for the in-memory engine.

use terrarium_domain::error::TerrariumError;

/// Errors originating from the in-memory storage layer.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// A writer panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

impl From<MemoryError> for TerrariumError {
    fn from(err: MemoryError) -> Self {
        Self::Storage(Box::new(err))
    }
}
