//! End-to-end tests for the full terrarium stack.
//!
//! Every check runs twice: against the in-memory engine and against an
//! in-memory `SQLite` database, through the real validator and services.

use chrono::{TimeZone, Utc};
use futures::{StreamExt, TryStreamExt};

use terrarium_adapter_storage_memory::MemoryStorage;
use terrarium_adapter_storage_sqlite_sqlx::{Config, SqliteStorage};
use terrarium_app::ports::{StaticIdentity, StorageProvider};
use terrarium_app::services::{EntityService, RelationService, RetryPolicy};
use terrarium_app::validator::IntegrityPolicy;
use terrarium_domain::entity::{
    Entity, EntityKind, Fields, Record, Reptile, ReptileFeedingLog, ReptileType, ReptileWeightLog,
};
use terrarium_domain::error::{
    ConflictError, ReferentialIntegrityError, TerrariumError, UnresolvedReason, ValidationError,
};
use terrarium_domain::id::{EntityId, ReptileId, UserId};
use terrarium_domain::mutation::Mutation;
use terrarium_domain::query::{Predicate, Query, Sort};
use terrarium_domain::value::{ContainerKind, Gender};

type Service<S> = EntityService<S, StaticIdentity>;

async fn sqlite() -> SqliteStorage {
    let db = Config::new("sqlite::memory:")
        .build()
        .await
        .expect("in-memory database should initialise");
    SqliteStorage::new(db.pool().clone(), 64)
}

fn service<S: StorageProvider + Clone>(storage: S) -> Service<S> {
    EntityService::new(
        storage,
        StaticIdentity::new(Some(UserId::new("keeper"))),
        IntegrityPolicy::default(),
    )
}

fn validation_failures(err: TerrariumError) -> Vec<ValidationError> {
    match err {
        TerrariumError::Validation(errors) => errors.into_vec(),
        other => panic!("expected a validation failure, got {other:?}"),
    }
}

struct Rack {
    reptile_type: Entity,
    feeding_box: Entity,
    slot: Entity,
}

async fn rack<S: StorageProvider + Clone>(service: &Service<S>) -> Rack {
    let reptile_type = service
        .create(
            EntityKind::ReptileType,
            Fields::new().with("name", "Leopard Gecko"),
        )
        .await
        .unwrap();
    let feeding_box = service
        .create(
            EntityKind::ReptileFeedingBox,
            Fields::new()
                .with("kind", ContainerKind::Box)
                .with("name", "Rack A"),
        )
        .await
        .unwrap();
    let slot = service
        .create(
            EntityKind::ReptileFeedingBoxIndexCollection,
            Fields::new()
                .with("verticalIndex", 2_i64)
                .with("horizontalIndex", 3_i64)
                .with("reptileFeedingBoxID", feeding_box.id),
        )
        .await
        .unwrap();
    Rack {
        reptile_type,
        feeding_box,
        slot,
    }
}

fn spot(rack: &Rack) -> Fields {
    Reptile::builder()
        .name("Spot")
        .gender(Gender::Unknown)
        .reptile_type_id(rack.reptile_type.id.into())
        .feeding_box_id(rack.feeding_box.id.into())
        .slot_id(rack.slot.id.into())
        .build()
}

async fn placement_scenario<S: StorageProvider + Clone>(storage: S) {
    let service = service(storage.clone());
    let rack = rack(&service).await;

    let created = service.create(EntityKind::Reptile, spot(&rack)).await.unwrap();

    let reptile = created.data_as::<Reptile>().unwrap();
    assert_eq!(reptile.name, "Spot");
    assert_eq!(reptile.gender, Gender::Unknown);
    assert!(reptile.genies.is_empty());
    assert_eq!(EntityId::from(reptile.reptile_type_id), rack.reptile_type.id);
    assert_eq!(EntityId::from(reptile.feeding_box_id), rack.feeding_box.id);
    assert_eq!(EntityId::from(reptile.slot_id), rack.slot.id);
    assert_eq!(created.user_id, Some(UserId::new("keeper")));

    let relations = RelationService::new(storage);
    let in_box = relations
        .children(EntityKind::ReptileFeedingBox, rack.feeding_box.id, "reptiles")
        .await
        .unwrap();
    assert_eq!(in_box, vec![created]);
}

async fn omitted_type_scenario<S: StorageProvider + Clone>(storage: S) {
    let service = service(storage);
    let rack = rack(&service).await;
    let mut input = spot(&rack);
    input.remove("reptileTypeID");

    let err = service.create(EntityKind::Reptile, input).await.unwrap_err();

    assert_eq!(
        validation_failures(err),
        vec![ValidationError::MissingReference {
            field: "reptileTypeID".to_string(),
            target: EntityKind::ReptileType,
        }]
    );
}

async fn unresolved_key_scenario<S: StorageProvider + Clone>(storage: S) {
    let service = service(storage);
    let rack = rack(&service).await;

    for (field, target) in [
        ("reptileTypeID", EntityKind::ReptileType),
        ("reptileFeedingBoxID", EntityKind::ReptileFeedingBox),
        (
            "reptileFeedingBoxIndexCollectionID",
            EntityKind::ReptileFeedingBoxIndexCollection,
        ),
    ] {
        let ghost = EntityId::new();
        let mut input = spot(&rack);
        input.insert(field, ghost.into());

        let err = service.create(EntityKind::Reptile, input).await.unwrap_err();

        assert_eq!(
            validation_failures(err),
            vec![ValidationError::ReferentialIntegrity(
                ReferentialIntegrityError {
                    field: field.to_string(),
                    target,
                    id: ghost,
                    reason: UnresolvedReason::Missing,
                }
            )],
            "unexpected failures for {field}"
        );
    }
}

async fn round_trip_scenario<S: StorageProvider + Clone>(storage: S) {
    let service = service(storage);
    let rack = rack(&service).await;
    let input = Reptile::builder()
        .name("Spot")
        .nickname("Spotty")
        .gender(Gender::PossibleMale)
        .weight(57.5)
        .birthdate(chrono::NaiveDate::from_ymd_opt(2022, 8, 30).unwrap())
        .genie("mack snow")
        .reptile_type_id(rack.reptile_type.id.into())
        .feeding_box_id(rack.feeding_box.id.into())
        .slot_id(rack.slot.id.into())
        .build();

    let created = service.create(EntityKind::Reptile, input.clone()).await.unwrap();
    let fetched = service.get(EntityKind::Reptile, created.id).await.unwrap();

    assert_eq!(fetched, created);
    assert_eq!(fetched.version, 1);
    assert_eq!(fetched.created_at, fetched.updated_at);
    for (name, value) in input.iter() {
        assert_eq!(
            fetched.field(name).map(serde_json::Value::from).as_ref(),
            Some(value),
            "field {name} did not survive storage"
        );
    }
}

async fn read_only_scenario<S: StorageProvider + Clone>(storage: S) {
    let service = service(storage);
    let rack = rack(&service).await;
    let base = &rack.reptile_type;

    let moved_id = Mutation::new()
        .set("id", EntityId::new())
        .set("name", "Fat-tailed Gecko");
    let backdated = Mutation::new()
        .set("createdAt", Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
        .set("name", "Fat-tailed Gecko");

    for mutation in [moved_id, backdated] {
        let err = service
            .update(EntityKind::ReptileType, base.id, base.version, &mutation)
            .await
            .unwrap_err();
        assert!(
            validation_failures(err)
                .iter()
                .any(|e| matches!(e, ValidationError::ReadOnlyField { .. }))
        );
    }
    let unchanged = service.get(EntityKind::ReptileType, base.id).await.unwrap();
    assert_eq!(&unchanged, base);
}

async fn concurrent_update_scenario<S: StorageProvider + Clone>(storage: S) {
    let service = service(storage);
    let rack = rack(&service).await;
    let created = service.create(EntityKind::Reptile, spot(&rack)).await.unwrap();

    let rename = Mutation::new().set("name", "Dot");
    let weigh = Mutation::new().set("weight", 44.0);
    let (first, second) = tokio::join!(
        service.update(EntityKind::Reptile, created.id, created.version, &rename),
        service.update(EntityKind::Reptile, created.id, created.version, &weigh),
    );

    let (won, lost_mutation, lost) = match (first, second) {
        (Ok(won), Err(lost)) => (won, &weigh, lost),
        (Err(lost), Ok(won)) => (won, &rename, lost),
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert_eq!(won.version, 2);
    assert!(matches!(
        lost,
        TerrariumError::Conflict(ConflictError::StaleVersion {
            expected: 1,
            actual: 2,
            ..
        })
    ));

    let resubmitted = service
        .update(EntityKind::Reptile, created.id, won.version, lost_mutation)
        .await
        .unwrap();
    assert_eq!(resubmitted.version, 3);
    let reptile = resubmitted.data_as::<Reptile>().unwrap();
    assert_eq!(reptile.name, "Dot");
    assert_eq!(reptile.weight, Some(44.0));

    let retried = service
        .update_with_retry(
            EntityKind::Reptile,
            created.id,
            &Mutation::new().set("nickname", "Dotty"),
            RetryPolicy::default(),
        )
        .await
        .unwrap();
    assert_eq!(retried.version, 4);
}

async fn log_order_scenario<S: StorageProvider + Clone>(storage: S) {
    let service = service(storage);
    let rack = rack(&service).await;
    let reptile = service.create(EntityKind::Reptile, spot(&rack)).await.unwrap();
    let reptile_id = ReptileId::from(reptile.id);

    let at = |day| Utc.with_ymd_and_hms(2024, 5, day, 19, 30, 0).unwrap();
    for (day, weight) in [(20, 46.0), (10, 44.0), (15, 45.0)] {
        service
            .create(
                EntityKind::ReptileWeightLog,
                ReptileWeightLog::new(reptile_id, weight, at(day)).to_fields(),
            )
            .await
            .unwrap();
    }
    for day in [12, 11] {
        service
            .create(
                EntityKind::ReptileFeedingLog,
                ReptileFeedingLog::new(reptile_id, at(day)).to_fields(),
            )
            .await
            .unwrap();
    }

    let weights: Vec<f64> = service
        .history(EntityKind::ReptileWeightLog, reptile_id, None, None)
        .await
        .unwrap()
        .iter()
        .filter_map(|e| e.data_as::<ReptileWeightLog>().map(|log| log.weight))
        .collect();
    assert_eq!(weights, vec![44.0, 45.0, 46.0]);

    let newest_first: Vec<Entity> = service
        .list(
            Query::new(EntityKind::ReptileFeedingLog)
                .filter(Predicate::all().eq("reptileID", reptile_id))
                .sort_by(Sort::descending("feedingDateTime")),
        )
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let days: Vec<_> = newest_first
        .iter()
        .filter_map(|e| e.data_as::<ReptileFeedingLog>().map(|log| log.feeding_date_time))
        .collect();
    assert_eq!(days, vec![at(12), at(11)]);
}

async fn tombstone_scenario<S: StorageProvider + Clone>(storage: S) {
    let service = service(storage);
    let rack = rack(&service).await;
    let reptile = service.create(EntityKind::Reptile, spot(&rack)).await.unwrap();

    let tombstone = service.delete(EntityKind::Reptile, reptile.id).await.unwrap();
    assert!(tombstone.deleted);
    assert_eq!(tombstone.version, reptile.version + 1);

    let err = service
        .create(
            EntityKind::ReptileWeightLog,
            ReptileWeightLog::new(reptile.id.into(), 40.0, Utc::now()).to_fields(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        validation_failures(err).as_slice(),
        [ValidationError::ReferentialIntegrity(ReferentialIntegrityError {
            reason: UnresolvedReason::Tombstoned,
            ..
        })]
    ));
    assert!(matches!(
        service
            .update(
                EntityKind::Reptile,
                reptile.id,
                tombstone.version,
                &Mutation::new().set("name", "Ghost"),
            )
            .await,
        Err(TerrariumError::NotFound(_))
    ));
}

async fn exclusive_slot_scenario<S: StorageProvider + Clone>(storage: S) {
    let service = EntityService::new(
        storage.clone(),
        StaticIdentity::new(None),
        IntegrityPolicy {
            allow_multiple_occupants_per_slot: false,
            ..IntegrityPolicy::default()
        },
    );
    let rack = rack(&service).await;

    let (spot, dot) = tokio::join!(
        service.create(EntityKind::Reptile, spot(&rack)),
        service.create(EntityKind::Reptile, spot(&rack).with("name", "Dot")),
    );

    let (placed, rejected) = match (spot, dot) {
        (Ok(placed), Err(rejected)) | (Err(rejected), Ok(placed)) => (placed, rejected),
        (spot, dot) => panic!("exactly one placement should land: {spot:?} / {dot:?}"),
    };
    assert_eq!(
        validation_failures(rejected),
        vec![ValidationError::SlotOccupied {
            slot: rack.slot.id.into(),
            occupant: placed.id.into(),
        }]
    );
    let occupants: Vec<Entity> = storage
        .list(Query::new(EntityKind::Reptile))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(occupants, vec![placed]);
}

async fn listing_across_deletes_scenario<S: StorageProvider + Clone>(storage: S) {
    let service = service(storage.clone());
    let mut types = Vec::new();
    for i in 0..150 {
        let created = service
            .create(
                EntityKind::ReptileType,
                ReptileType::new(format!("type-{i:03}")).to_fields(),
            )
            .await
            .unwrap();
        types.push(created);
    }

    let mut listing = Box::pin(
        storage.list(Query::new(EntityKind::ReptileType).sort_by(Sort::ascending("name"))),
    );
    let mut seen = Vec::new();
    for _ in 0..100 {
        seen.push(listing.next().await.unwrap().unwrap().id);
    }
    service
        .delete(EntityKind::ReptileType, types[0].id)
        .await
        .unwrap();
    while let Some(entity) = listing.try_next().await.unwrap() {
        seen.push(entity.id);
    }

    let expected: Vec<EntityId> = types.iter().map(|t| t.id).collect();
    assert_eq!(seen, expected);
}

macro_rules! on_every_provider {
    ($($name:ident => $scenario:ident),+ $(,)?) => {$(
        mod $name {
            use super::*;

            #[tokio::test]
            async fn memory() {
                $scenario(MemoryStorage::default()).await;
            }

            #[tokio::test]
            async fn sqlite() {
                $scenario(super::sqlite().await).await;
            }
        }
    )+};
}

on_every_provider!(
    should_place_reptile_in_rack => placement_scenario,
    should_report_single_missing_reference_when_type_omitted => omitted_type_scenario,
    should_report_single_error_per_unresolved_key => unresolved_key_scenario,
    should_read_back_what_was_created => round_trip_scenario,
    should_reject_changes_to_identity_and_creation_time => read_only_scenario,
    should_let_one_concurrent_update_win => concurrent_update_scenario,
    should_order_logs_by_event_time => log_order_scenario,
    should_keep_tombstones_out_of_references => tombstone_scenario,
    should_place_one_reptile_per_exclusive_slot => exclusive_slot_scenario,
    should_list_every_live_entity_across_deletes => listing_across_deletes_scenario,
);
