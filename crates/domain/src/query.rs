//! Query language of the storage contract: predicates, sorting and paging.
//!
//! A [`Predicate`] is a conjunction of field comparisons (equals, inclusive
//! range, membership). Evaluation works on decoded [`FieldValue`]s, so
//! timestamps order chronologically and numbers numerically whatever their
//! wire spelling.

use std::cmp::Ordering;

use crate::entity::{Entity, EntityKind};
use crate::error::UnknownFieldError;
use crate::id::EntityId;
use crate::schema;
use crate::time::Timestamp;
use crate::value::FieldValue;

/// A single comparison applied to a field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Equals(FieldValue),
    /// Inclusive on both ends; an absent bound is open.
    Range {
        min: Option<FieldValue>,
        max: Option<FieldValue>,
    },
    In(Vec<FieldValue>),
}

impl Comparison {
    /// Whether `value` satisfies the comparison. Unset fields never match.
    #[must_use]
    pub fn matches(&self, value: Option<&FieldValue>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            Self::Equals(expected) => value.same_as(expected),
            Self::Range { min, max } => {
                let above = min.as_ref().is_none_or(|min| {
                    matches!(
                        value.compare(min),
                        Some(Ordering::Greater | Ordering::Equal)
                    )
                });
                let below = max.as_ref().is_none_or(|max| {
                    matches!(value.compare(max), Some(Ordering::Less | Ordering::Equal))
                });
                above && below
            }
            Self::In(candidates) => candidates.iter().any(|c| value.same_as(c)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub comparison: Comparison,
}

/// Conjunction of conditions. The empty predicate matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    /// The predicate that matches every entity.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.and(field, Comparison::Equals(value.into()))
    }

    #[must_use]
    pub fn range(
        self,
        field: impl Into<String>,
        min: Option<FieldValue>,
        max: Option<FieldValue>,
    ) -> Self {
        self.and(field, Comparison::Range { min, max })
    }

    #[must_use]
    pub fn one_of<V: Into<FieldValue>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.and(field, Comparison::In(values))
    }

    #[must_use]
    pub fn and(mut self, field: impl Into<String>, comparison: Comparison) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            comparison,
        });
        self
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        self.conditions
            .iter()
            .all(|c| c.comparison.matches(entity.field(&c.field).as_ref()))
    }

    /// Ensure every condition names a declared field of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownFieldError`] for the first undeclared field.
    pub fn check(&self, kind: EntityKind) -> Result<(), UnknownFieldError> {
        self.conditions
            .iter()
            .try_for_each(|c| check_field(kind, &c.field))
    }
}

fn check_field(kind: EntityKind, field: &str) -> Result<(), UnknownFieldError> {
    match schema::describe(kind).field(field) {
        Some(_) => Ok(()),
        None => Err(UnknownFieldError {
            kind,
            field: field.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Ordering by one declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    #[must_use]
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    #[must_use]
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Compare two entities by the sort field. Unset values sort first when
    /// ascending.
    #[must_use]
    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        self.compare_values(a.field(&self.field).as_ref(), b.field(&self.field).as_ref())
    }

    /// Compare two values of the sort field, honoring the direction.
    #[must_use]
    pub fn compare_values(&self, a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
        let ordering = match (a, b) {
            (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// A listing request against one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub kind: EntityKind,
    pub predicate: Predicate,
    pub sort: Option<Sort>,
}

impl Query {
    /// All live entities of `kind`, in creation order.
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            predicate: Predicate::all(),
            sort: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    #[must_use]
    pub fn sort_by(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Ensure the predicate and sort only name declared fields.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownFieldError`] for the first undeclared field.
    pub fn check(&self) -> Result<(), UnknownFieldError> {
        self.predicate.check(self.kind)?;
        match &self.sort {
            Some(sort) => check_field(self.kind, &sort.field),
            None => Ok(()),
        }
    }

    /// Whether `entity` is live, of this kind, and matches the predicate.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        entity.kind() == self.kind && entity.is_active() && self.predicate.matches(entity)
    }

    /// Position of `entity` in this query's order.
    #[must_use]
    pub fn cursor(&self, entity: &Entity) -> Cursor {
        Cursor {
            sort_value: self.sort.as_ref().and_then(|sort| entity.field(&sort.field)),
            created_at: entity.created_at,
            id: entity.id,
        }
    }

    /// Compare two positions in this query's order.
    #[must_use]
    pub fn compare_cursors(&self, a: &Cursor, b: &Cursor) -> Ordering {
        self.sort
            .as_ref()
            .map_or(Ordering::Equal, |sort| {
                sort.compare_values(a.sort_value.as_ref(), b.sort_value.as_ref())
            })
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Whether `entity` sorts strictly after `cursor`.
    #[must_use]
    pub fn is_after(&self, entity: &Entity, cursor: &Cursor) -> bool {
        self.compare_cursors(&self.cursor(entity), cursor) == Ordering::Greater
    }

    /// Sort entities in query order. Ties break on `createdAt` then `id`
    /// so pages are stable.
    pub fn order(&self, entities: &mut [Entity]) {
        entities.sort_by(|a, b| {
            self.sort
                .as_ref()
                .map_or(Ordering::Equal, |sort| sort.compare(a, b))
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}

/// Position of the last entity a page returned.
///
/// The next page starts strictly after it, so writes committed between
/// pages neither skip nor repeat entities that stayed live.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    /// Value of the sort field, `None` when unsorted or unset.
    pub sort_value: Option<FieldValue>,
    pub created_at: Timestamp,
    pub id: EntityId,
}

/// Window into an ordered listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub after: Option<Cursor>,
    pub limit: usize,
}

impl PageRequest {
    #[must_use]
    pub fn first(limit: usize) -> Self {
        Self { after: None, limit }
    }
}

/// One page of a listing and the request for the next, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub entities: Vec<Entity>,
    pub next: Option<PageRequest>,
}

impl Page {
    /// Cut `request` out of a listing already ordered by `query`.
    #[must_use]
    pub fn slice(query: &Query, ordered: Vec<Entity>, request: PageRequest) -> Self {
        let mut remaining = ordered
            .into_iter()
            .filter(|entity| {
                request
                    .after
                    .as_ref()
                    .is_none_or(|cursor| query.is_after(entity, cursor))
            })
            .peekable();
        let entities: Vec<Entity> = remaining.by_ref().take(request.limit).collect();
        let next = if remaining.peek().is_some() {
            entities.last().map(|last| PageRequest {
                after: Some(query.cursor(last)),
                limit: request.limit,
            })
        } else {
            None
        };
        Self { entities, next }
    }
}
