//! # terrariumd — terrarium daemon
//!
//! Composition root that wires the storage engine, identity and services
//! together and keeps projections current until shutdown.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the tracing subscriber
//! - Select and initialize the storage engine (`SQLite` or in-memory)
//! - Construct application services, injecting the engine via port traits
//! - Audit stored references and maintain reverse-relation projections
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use terrarium_adapter_storage_memory::MemoryStorage;
use terrarium_adapter_storage_sqlite_sqlx::SqliteStorage;
use terrarium_app::ports::StorageProvider;
use terrarium_app::projection::{self, ReverseIndex};
use terrarium_app::services::{EntityService, IntegrityAudit};
use terrarium_domain::entity::EntityKind;
use terrarium_domain::query::Query;

use crate::config::{Config, StorageBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.logging.filter).context("parsing log filter")?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory storage");
            run(MemoryStorage::new(config.change_feed.capacity), &config).await
        }
        StorageBackend::Sqlite => {
            tracing::info!(url = %config.storage.database_url, "using sqlite storage");
            let db = config
                .sqlite()
                .build()
                .await
                .context("opening sqlite database")?;
            let storage = SqliteStorage::new(db.pool().clone(), config.change_feed.capacity);
            run(storage, &config).await
        }
    }
}

async fn run<S>(storage: S, config: &Config) -> anyhow::Result<()>
where
    S: StorageProvider + Clone + 'static,
{
    let entities = EntityService::new(
        storage.clone(),
        config.identity(),
        config.integrity_policy(),
    );

    let dangling = IntegrityAudit::new(storage.clone()).scan().await?;
    for item in &dangling {
        tracing::warn!(
            kind = %item.kind,
            id = %item.id,
            reference = %item.reference,
            "dangling reference"
        );
    }

    let reptiles_by_box = Arc::new(RwLock::new(ReverseIndex::for_relation(
        EntityKind::ReptileFeedingBox,
        "reptiles",
    )?));
    let projection = tokio::spawn(projection::maintain(
        reptiles_by_box.clone(),
        storage.clone(),
    ));

    let reptiles = entities.collect(Query::new(EntityKind::Reptile)).await?;
    let boxes = entities
        .collect(Query::new(EntityKind::ReptileFeedingBox))
        .await?;
    tracing::info!(
        reptiles = reptiles.len(),
        feeding_boxes = boxes.len(),
        dangling = dangling.len(),
        "terrariumd ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutting down");
    projection.abort();

    Ok(())
}
