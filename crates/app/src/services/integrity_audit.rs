//! Integrity audit — finds references left dangling by tombstones.
//!
//! Deletion is soft, so a live log may still point at a deleted reptile.
//! The audit walks live entities and reports every such reference instead of
//! letting readers dereference nothing.

use futures::TryStreamExt;
use terrarium_domain::entity::{Entity, EntityKind};
use terrarium_domain::error::{ReferentialIntegrityError, TerrariumError, UnresolvedReason};
use terrarium_domain::id::EntityId;
use terrarium_domain::query::Query;
use terrarium_domain::schema;

use crate::ports::StorageProvider;

/// A live entity holding a foreign key that no longer resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub kind: EntityKind,
    pub id: EntityId,
    pub reference: ReferentialIntegrityError,
}

/// Application service scanning storage for dangling references.
pub struct IntegrityAudit<S> {
    storage: S,
}

impl<S: StorageProvider> IntegrityAudit<S> {
    /// Create a new audit backed by the given storage.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Every dangling foreign key held by live entities of `kind`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if listing or a lookup fails.
    #[tracing::instrument(skip(self))]
    pub async fn dangling_references(
        &self,
        kind: EntityKind,
    ) -> Result<Vec<DanglingReference>, TerrariumError> {
        let schema = schema::describe(kind);
        let entities: Vec<Entity> = self.storage.list(Query::new(kind)).try_collect().await?;
        let mut dangling = Vec::new();

        for entity in entities {
            for (def, target) in schema.references() {
                let Some(target_id) = entity.data.foreign_key(def.name) else {
                    continue;
                };
                let reason = match self.storage.get_including_deleted(target, target_id).await? {
                    Some(parent) if parent.is_active() => continue,
                    Some(_) => UnresolvedReason::Tombstoned,
                    None => UnresolvedReason::Missing,
                };
                dangling.push(DanglingReference {
                    kind,
                    id: entity.id,
                    reference: ReferentialIntegrityError {
                        field: def.name.to_string(),
                        target,
                        id: target_id,
                        reason,
                    },
                });
            }
        }

        if !dangling.is_empty() {
            tracing::warn!(count = dangling.len(), "dangling references found");
        }
        Ok(dangling)
    }

    /// Dangling references across every entity kind.
    ///
    /// # Errors
    ///
    /// Returns a storage error if listing or a lookup fails.
    pub async fn scan(&self) -> Result<Vec<DanglingReference>, TerrariumError> {
        let mut all = Vec::new();
        for kind in EntityKind::ALL {
            all.extend(self.dangling_references(kind).await?);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use terrarium_domain::entity::{Record, ReptileWeightLog};
    use terrarium_domain::id::ReptileId;

    use super::*;
    use crate::testing::{InMemoryStorage, create, placement, reptile_input};

    #[tokio::test]
    async fn should_report_logs_of_deleted_reptile() {
        let storage = Arc::new(InMemoryStorage::default());
        let placement = placement(&storage).await;
        let spot = create(
            &storage,
            EntityKind::Reptile,
            reptile_input(&placement, "Spot"),
        )
        .await;
        let log = ReptileWeightLog::new(ReptileId::from(spot.id), 40.0, Utc::now());
        let log = create(&storage, EntityKind::ReptileWeightLog, log.to_fields()).await;
        storage.delete(EntityKind::Reptile, spot.id).await.unwrap();

        let audit = IntegrityAudit::new(storage.clone());
        let dangling = audit
            .dangling_references(EntityKind::ReptileWeightLog)
            .await
            .unwrap();

        assert_eq!(
            dangling,
            vec![DanglingReference {
                kind: EntityKind::ReptileWeightLog,
                id: log.id,
                reference: ReferentialIntegrityError {
                    field: "reptileID".to_string(),
                    target: EntityKind::Reptile,
                    id: spot.id,
                    reason: UnresolvedReason::Tombstoned,
                },
            }]
        );
    }

    #[tokio::test]
    async fn should_find_nothing_in_consistent_storage() {
        let storage = Arc::new(InMemoryStorage::default());
        let placement = placement(&storage).await;
        create(
            &storage,
            EntityKind::Reptile,
            reptile_input(&placement, "Spot"),
        )
        .await;

        let audit = IntegrityAudit::new(storage);
        assert!(audit.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_report_missing_targets() {
        let storage = Arc::new(InMemoryStorage::default());
        let placement = placement(&storage).await;
        let spot = create(
            &storage,
            EntityKind::Reptile,
            reptile_input(&placement, "Spot"),
        )
        .await;
        let mut orphan = spot.clone();
        orphan.id = EntityId::new();
        if let terrarium_domain::entity::EntityData::Reptile(reptile) = &mut orphan.data {
            reptile.reptile_type_id = terrarium_domain::id::ReptileTypeId::new();
        }
        storage.insert_raw(orphan.clone());

        let audit = IntegrityAudit::new(storage);
        let dangling = audit.dangling_references(EntityKind::Reptile).await.unwrap();

        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].id, orphan.id);
        assert_eq!(dangling[0].reference.reason, UnresolvedReason::Missing);
    }
}
