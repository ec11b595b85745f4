//! Reverse-relation projections kept current from the change feed.
//!
//! A [`ReverseIndex`] answers "which children point at this parent" for one
//! foreign-key edge without listing storage on every read. It is seeded from
//! [`StorageProvider::list`] and then follows [`StorageProvider::subscribe`].
//! When the subscription lags the index is rebuilt from scratch.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use tokio::sync::RwLock;

use terrarium_domain::change::ChangeEvent;
use terrarium_domain::entity::{Entity, EntityKind};
use terrarium_domain::error::{TerrariumError, UnknownFieldError};
use terrarium_domain::id::EntityId;
use terrarium_domain::query::{Predicate, Query};
use terrarium_domain::schema::{FOREIGN_KEYS, ForeignKey};

use crate::ports::StorageProvider;

/// Children grouped by parent along a single foreign key.
#[derive(Debug, Clone)]
pub struct ReverseIndex {
    edge: ForeignKey,
    by_parent: HashMap<EntityId, BTreeSet<EntityId>>,
    parent_of: HashMap<EntityId, EntityId>,
}

impl ReverseIndex {
    /// An empty index for the edge `edge`.
    #[must_use]
    pub fn new(edge: ForeignKey) -> Self {
        Self {
            edge,
            by_parent: HashMap::new(),
            parent_of: HashMap::new(),
        }
    }

    /// An empty index for the collection `relation` of `parent_kind`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownFieldError`] when `parent_kind` has no such collection.
    pub fn for_relation(
        parent_kind: EntityKind,
        relation: &str,
    ) -> Result<Self, UnknownFieldError> {
        FOREIGN_KEYS
            .iter()
            .find(|fk| fk.target == parent_kind && fk.inverse == relation)
            .map(|fk| Self::new(*fk))
            .ok_or_else(|| UnknownFieldError {
                kind: parent_kind,
                field: relation.to_string(),
            })
    }

    #[must_use]
    pub fn edge(&self) -> &ForeignKey {
        &self.edge
    }

    /// Build an index from every live child currently in storage.
    ///
    /// # Errors
    ///
    /// Returns a storage error if listing fails.
    pub async fn load<S: StorageProvider>(
        edge: ForeignKey,
        storage: &S,
    ) -> Result<Self, TerrariumError> {
        let mut index = Self::new(edge);
        let children: Vec<Entity> = storage.list(Query::new(edge.source)).try_collect().await?;
        for child in &children {
            index.place(child);
        }
        tracing::debug!(
            relation = edge.inverse,
            children = index.parent_of.len(),
            "reverse index seeded"
        );
        Ok(index)
    }

    /// Fold one change into the index. Changes to other kinds are ignored.
    pub fn apply(&mut self, event: &ChangeEvent) {
        if event.entity_kind() != self.edge.source {
            return;
        }
        self.place(&event.entity);
    }

    /// Ids of the live children of `parent`, in id order.
    #[must_use]
    pub fn children(&self, parent: EntityId) -> Vec<EntityId> {
        self.by_parent
            .get(&parent)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn place(&mut self, child: &Entity) {
        self.remove(child.id);
        if !child.is_active() {
            return;
        }
        if let Some(parent) = child.data.foreign_key(self.edge.field) {
            self.by_parent.entry(parent).or_default().insert(child.id);
            self.parent_of.insert(child.id, parent);
        }
    }

    fn remove(&mut self, child: EntityId) {
        let Some(parent) = self.parent_of.remove(&child) else {
            return;
        };
        if let Some(set) = self.by_parent.get_mut(&parent) {
            set.remove(&child);
            if set.is_empty() {
                self.by_parent.remove(&parent);
            }
        }
    }
}

/// Keep `index` current until the change feed closes.
///
/// The subscription is opened before seeding so no committed change falls
/// between the two. After a lag the index is re-seeded on a fresh
/// subscription.
///
/// # Errors
///
/// Returns a storage error if seeding fails.
pub async fn maintain<S: StorageProvider>(
    index: Arc<RwLock<ReverseIndex>>,
    storage: S,
) -> Result<(), TerrariumError> {
    let edge = *index.read().await.edge();
    loop {
        let mut changes = storage.subscribe(edge.source, Predicate::all()).boxed();
        let fresh = ReverseIndex::load(edge, &storage).await?;
        *index.write().await = fresh;

        let mut lagged = false;
        while let Some(change) = changes.next().await {
            match change {
                Ok(event) => index.write().await.apply(&event),
                Err(err) => {
                    tracing::warn!(
                        relation = edge.inverse,
                        error = %err,
                        "re-seeding reverse index"
                    );
                    lagged = true;
                    break;
                }
            }
        }
        if !lagged {
            return Ok(());
        }
    }
}
