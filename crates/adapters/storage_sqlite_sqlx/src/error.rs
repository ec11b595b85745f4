//! Storage-specific error type wrapping sqlx errors.

use terrarium_domain::entity::Version;
use terrarium_domain::error::TerrariumError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize or deserialize a stored JSON payload.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The version counter no longer fits an `SQLite` integer.
    #[error("version {0} is out of range")]
    VersionOutOfRange(Version),
}

impl From<StorageError> for TerrariumError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
