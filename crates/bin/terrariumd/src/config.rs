//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `terrarium.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use terrarium_app::ports::StaticIdentity;
use terrarium_app::validator::IntegrityPolicy;
use terrarium_domain::id::UserId;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage engine settings.
    pub storage: StorageConfig,
    /// Integrity rules left to the deployment.
    pub integrity: IntegrityConfig,
    /// Identity attached to records created by this process.
    pub identity: IdentityConfig,
    /// Change notification buffering.
    pub change_feed: ChangeFeedConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Which storage engine backs the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Entities live in process memory and vanish on exit.
    Memory,
    #[default]
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::Validation(format!(
                "unknown storage backend `{other}`, expected `memory` or `sqlite`"
            ))),
        }
    }
}

/// Storage engine configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// `SQLite` connection URL or file path.
    pub database_url: String,
    /// `SQLite` pool size.
    pub max_connections: u32,
}

/// Integrity policy configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    pub allow_multiple_occupants_per_slot: bool,
    pub enforce_tenant_consistency: bool,
    /// Upper bound for one reference lookup, in milliseconds.
    pub lookup_timeout_ms: Option<u64>,
}

/// Identity configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Owner of created records; anonymous when unset.
    pub user_id: Option<String>,
}

/// Change feed configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChangeFeedConfig {
    /// Events buffered per subscriber before it is reported as lagging.
    pub capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `terrarium.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("terrarium.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("TERRARIUM_STORAGE") {
            self.storage.backend = val.parse()?;
        }
        if let Some(val) = lookup("TERRARIUM_DATABASE_URL") {
            self.storage.database_url = val;
        }
        if let Some(val) = lookup("TERRARIUM_USER_ID") {
            self.identity.user_id = Some(val);
        }
        if let Some(val) = lookup("TERRARIUM_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.change_feed.capacity == 0 {
            return Err(ConfigError::Validation(
                "change_feed.capacity must be non-zero".to_string(),
            ));
        }
        if self.integrity.lookup_timeout_ms == Some(0) {
            return Err(ConfigError::Validation(
                "integrity.lookup_timeout_ms must be non-zero when set".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Sqlite {
            if self.storage.database_url.is_empty() {
                return Err(ConfigError::Validation(
                    "storage.database_url is required for the sqlite backend".to_string(),
                ));
            }
            if self.storage.max_connections == 0 {
                return Err(ConfigError::Validation(
                    "storage.max_connections must be non-zero".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Integrity rules to validate writes with.
    #[must_use]
    pub fn integrity_policy(&self) -> IntegrityPolicy {
        IntegrityPolicy {
            allow_multiple_occupants_per_slot: self.integrity.allow_multiple_occupants_per_slot,
            enforce_tenant_consistency: self.integrity.enforce_tenant_consistency,
            lookup_timeout: self.integrity.lookup_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Identity provider for this process.
    #[must_use]
    pub fn identity(&self) -> StaticIdentity {
        StaticIdentity::new(self.identity.user_id.as_deref().map(UserId::new))
    }

    /// Connection settings for the `SQLite` backend.
    #[must_use]
    pub fn sqlite(&self) -> terrarium_adapter_storage_sqlite_sqlx::Config {
        terrarium_adapter_storage_sqlite_sqlx::Config {
            database_url: self.storage.database_url.clone(),
            max_connections: self.storage.max_connections,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_url: "sqlite:terrarium.db?mode=rwc".to_string(),
            max_connections: terrarium_adapter_storage_sqlite_sqlx::pool::DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        let policy = IntegrityPolicy::default();
        Self {
            allow_multiple_occupants_per_slot: policy.allow_multiple_occupants_per_slot,
            enforce_tenant_consistency: policy.enforce_tenant_consistency,
            lookup_timeout_ms: None,
        }
    }
}

impl Default for ChangeFeedConfig {
    fn default() -> Self {
        Self {
            capacity: terrarium_adapter_storage_memory::DEFAULT_FEED_CAPACITY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "terrarium=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
