//! `SQLite` implementation of [`StorageProvider`].

use std::str::FromStr;
use std::sync::Arc;

use chrono::SecondsFormat;
use futures::Stream;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};
use tokio::sync::Mutex;

use terrarium_app::change_feed::ChangeFeed;
use terrarium_app::ports::StorageProvider;
use terrarium_app::validator::{SlotClaim, ValidatedEntity, ValidatedUpdate, stale};
use terrarium_domain::change::ChangeEvent;
use terrarium_domain::entity::{Entity, EntityData, EntityKind, Version};
use terrarium_domain::error::{ConflictError, NotFoundError, SubscriptionLagged, TerrariumError};
use terrarium_domain::id::{EntityId, UserId};
use terrarium_domain::query::{
    Comparison, Condition, Page, PageRequest, Predicate, Query, SortDirection,
};
use terrarium_domain::schema::{self, FieldType};
use terrarium_domain::time::Timestamp;
use terrarium_domain::value::FieldValue;

use crate::error::StorageError;

/// Wrapper for converting database rows into domain types without polluting
/// domain structs with database concerns.
struct Wrapper(Entity);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Entity> {
        value.map(|w| w.0)
    }
}

fn decode_err(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

fn parse_timestamp(value: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.to_utc())
        .map_err(decode_err)
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let kind: String = row.try_get("kind")?;
        let user_id: Option<String> = row.try_get("user_id")?;
        let version: i64 = row.try_get("version")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;
        let deleted: bool = row.try_get("deleted")?;
        let data: String = row.try_get("data")?;

        let id = EntityId::from_str(&id).map_err(decode_err)?;
        let kind = EntityKind::from_str(&kind).map_err(decode_err)?;
        let version = Version::try_from(version).map_err(decode_err)?;
        let data: EntityData = serde_json::from_str(&data).map_err(decode_err)?;
        if data.kind() != kind {
            return Err(sqlx::Error::Decode(
                format!("row {id} is a {kind} holding a {} payload", data.kind()).into(),
            ));
        }

        Ok(Self(Entity {
            id,
            user_id: user_id.map(UserId::new),
            version,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
            deleted,
            data,
        }))
    }
}

/// Fixed-width with every sub-second digit, so timestamps read back
/// unchanged and text order is chronological order.
fn format_timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn version_param(version: Version) -> Result<i64, StorageError> {
    i64::try_from(version).map_err(|_| StorageError::VersionOutOfRange(version))
}

const INSERT: &str = r"
    INSERT INTO entities (id, kind, user_id, version, created_at, updated_at, deleted, data)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_BY_ID: &str = "SELECT * FROM entities WHERE id = ?";

const SELECT_SLOT_OCCUPANT: &str = r"
    SELECT * FROM entities
    WHERE kind = ? AND deleted = 0 AND id != ?
      AND json_extract(data, '$.fields.reptileFeedingBoxIndexCollectionID') = ?
    LIMIT 1
";

const UPDATE_IF_VERSION: &str = r"
    UPDATE entities
    SET user_id = ?, version = ?, updated_at = ?, deleted = ?, data = ?
    WHERE id = ? AND version = ?
";

/// Where a pushed-down condition reads its value.
enum Column {
    Plain(&'static str),
    /// JSON path into the `data` payload.
    Payload(String),
}

/// Equality or membership on an id or text field, which `SQLite` can
/// evaluate exactly on the stored text.
fn pushed_down(kind: EntityKind, condition: &Condition) -> Option<(Column, Vec<String>)> {
    let def = schema::describe(kind).field(&condition.field)?;
    let values = match &condition.comparison {
        Comparison::Equals(value) => vec![value],
        Comparison::In(values) => values.iter().collect(),
        Comparison::Range { .. } => return None,
    };
    let values = values
        .into_iter()
        .map(|value| match (def.field_type, value) {
            (FieldType::Id | FieldType::Reference(_), FieldValue::Id(id)) => Some(id.to_string()),
            (FieldType::Text | FieldType::Enum(_), FieldValue::Text(text)) => Some(text.clone()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    let column = match def.name {
        schema::ID => Column::Plain("id"),
        schema::USER_ID => Column::Plain("user_id"),
        schema::CREATED_AT | schema::UPDATED_AT => return None,
        field => Column::Payload(format!("$.fields.{field}")),
    };
    Some((column, values))
}

/// Build the `SELECT` for one page.
///
/// Id and text conditions are filtered by `SQLite`; the decoded rows are
/// still matched against the full query. Listings in creation order are
/// also positioned and, when every condition was pushed down, limited by
/// `SQLite`.
fn page_statement(query: &Query, page: &PageRequest) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new("SELECT * FROM entities WHERE deleted = 0 AND kind = ");
    builder.push_bind(query.kind.as_str());

    let mut exact = true;
    for condition in query.predicate.conditions() {
        let Some((column, values)) = pushed_down(query.kind, condition) else {
            exact = false;
            continue;
        };
        if values.is_empty() {
            builder.push(" AND 0");
            continue;
        }
        match column {
            Column::Plain(name) => {
                builder.push(format_args!(" AND {name} IN ("));
            }
            Column::Payload(path) => {
                builder.push(" AND json_extract(data, ");
                builder.push_bind(path);
                builder.push(") IN (");
            }
        }
        let mut separated = builder.separated(", ");
        for value in values {
            separated.push_bind(value);
        }
        separated.push_unseparated(")");
    }

    let direction = match &query.sort {
        None => Some(SortDirection::Ascending),
        Some(sort) if sort.field == schema::CREATED_AT => Some(sort.direction),
        Some(_) => None,
    };
    let Some(direction) = direction else {
        return builder;
    };
    let (before_or_after, order) = match direction {
        SortDirection::Ascending => (">", "ASC"),
        SortDirection::Descending => ("<", "DESC"),
    };
    if let Some(cursor) = &page.after {
        let created_at = format_timestamp(cursor.created_at);
        builder.push(format_args!(" AND (created_at {before_or_after} "));
        builder.push_bind(created_at.clone());
        builder.push(" OR (created_at = ");
        builder.push_bind(created_at);
        builder.push(" AND id > ");
        builder.push_bind(cursor.id.to_string());
        builder.push("))");
    }
    builder.push(format_args!(" ORDER BY created_at {order}, id ASC"));
    if exact {
        // one extra row tells whether another page follows
        let limit = i64::try_from(page.limit.saturating_add(1)).unwrap_or(i64::MAX);
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
    builder
}

/// `SQLite`-backed storage provider.
///
/// Writes from this process are serialized so change events are published
/// in commit order. The version guard in every `UPDATE` protects against
/// other writers sharing the database file.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
    feed: ChangeFeed,
    writes: Arc<Mutex<()>>,
}

impl SqliteStorage {
    /// Create a provider using the given connection pool. The change feed
    /// buffers `feed_capacity` events per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `feed_capacity` is zero.
    #[must_use]
    pub fn new(pool: SqlitePool, feed_capacity: usize) -> Self {
        Self {
            pool,
            feed: ChangeFeed::new(feed_capacity),
            writes: Arc::new(Mutex::new(())),
        }
    }

    async fn select(&self, id: EntityId) -> Result<Option<Entity>, StorageError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(Wrapper::maybe(row))
    }

    /// Fail if another live reptile already holds the claimed slot.
    async fn check_claim(&self, claim: Option<SlotClaim>) -> Result<(), TerrariumError> {
        let Some(claim) = claim else {
            return Ok(());
        };
        let row: Option<Wrapper> = sqlx::query_as(SELECT_SLOT_OCCUPANT)
            .bind(EntityKind::Reptile.as_str())
            .bind(claim.claimant.to_string())
            .bind(EntityId::from(claim.slot).to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        match Wrapper::maybe(row) {
            Some(occupant) => Err(claim.occupied_by(&occupant)),
            None => Ok(()),
        }
    }

    async fn insert(&self, entity: &Entity) -> Result<(), TerrariumError> {
        let data = serde_json::to_string(&entity.data).map_err(StorageError::from)?;
        let result = sqlx::query(INSERT)
            .bind(entity.id.to_string())
            .bind(entity.kind().as_str())
            .bind(entity.user_id.as_ref().map(UserId::as_str))
            .bind(version_param(entity.version)?)
            .bind(format_timestamp(entity.created_at))
            .bind(format_timestamp(entity.updated_at))
            .bind(entity.deleted)
            .bind(&data)
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(ConflictError::DuplicateId {
                    kind: entity.kind(),
                    id: entity.id,
                }
                .into())
            }
            Err(err) => Err(StorageError::from(err).into()),
        }
    }

    /// Overwrite the row of `next` if it is still at `expected` version.
    async fn replace(&self, next: &Entity, expected: Version) -> Result<(), TerrariumError> {
        let data = serde_json::to_string(&next.data).map_err(StorageError::from)?;
        let result = sqlx::query(UPDATE_IF_VERSION)
            .bind(next.user_id.as_ref().map(UserId::as_str))
            .bind(version_param(next.version)?)
            .bind(format_timestamp(next.updated_at))
            .bind(next.deleted)
            .bind(&data)
            .bind(next.id.to_string())
            .bind(version_param(expected)?)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        let kind = next.kind();
        match self.select(next.id).await? {
            Some(current) if current.is_active() => {
                Err(stale(kind, next.id, expected, current.version))
            }
            _ => Err(NotFoundError { kind, id: next.id }.into()),
        }
    }
}

impl StorageProvider for SqliteStorage {
    async fn get_including_deleted(
        &self,
        kind: EntityKind,
        id: EntityId,
    ) -> Result<Option<Entity>, TerrariumError> {
        let found = self.select(id).await?;
        Ok(found.filter(|e| e.kind() == kind))
    }

    async fn fetch_page(&self, query: &Query, page: PageRequest) -> Result<Page, TerrariumError> {
        let rows: Vec<Wrapper> = page_statement(query, &page)
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        let mut matching: Vec<Entity> = rows
            .into_iter()
            .map(|w| w.0)
            .filter(|e| query.matches(e))
            .collect();
        query.order(&mut matching);
        Ok(Page::slice(query, matching, page))
    }

    #[tracing::instrument(skip_all, fields(kind = %entity.kind(), id = %entity.id()))]
    async fn create(&self, entity: ValidatedEntity) -> Result<Entity, TerrariumError> {
        let _guard = self.writes.lock().await;
        if let Some(existing) = self.select(entity.id()).await? {
            if entity.is_client_supplied() && entity.same_content_as(&existing) {
                tracing::debug!("replayed create");
                return Ok(existing);
            }
            return Err(ConflictError::DuplicateId {
                kind: entity.kind(),
                id: entity.id(),
            }
            .into());
        }
        self.check_claim(entity.slot_claim()).await?;
        let entity = entity.into_entity();
        self.insert(&entity).await?;
        self.feed.publish(ChangeEvent::created(entity.clone()));
        Ok(entity)
    }

    #[tracing::instrument(skip_all, fields(kind = %update.kind(), id = %update.id()))]
    async fn update(&self, update: ValidatedUpdate) -> Result<Entity, TerrariumError> {
        let _guard = self.writes.lock().await;
        let kind = update.kind();
        let expected = update.base_version();
        self.check_claim(update.slot_claim()).await?;
        let current = self.select(update.id()).await?.filter(|e| e.kind() == kind);
        let next = update.apply_to(current)?;
        self.replace(&next, expected).await?;
        self.feed.publish(ChangeEvent::updated(next.clone()));
        Ok(next)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<Entity, TerrariumError> {
        let _guard = self.writes.lock().await;
        let current = self
            .select(id)
            .await?
            .filter(|e| e.kind() == kind && e.is_active())
            .ok_or(NotFoundError { kind, id })?;
        let expected = current.version;
        let tombstone = current.tombstoned();
        self.replace(&tombstone, expected).await?;
        self.feed.publish(ChangeEvent::deleted(tombstone.clone()));
        Ok(tombstone)
    }

    fn subscribe(
        &self,
        kind: EntityKind,
        predicate: Predicate,
    ) -> impl Stream<Item = Result<ChangeEvent, SubscriptionLagged>> + Send + 'static {
        self.feed.subscribe(kind, predicate)
    }
}
