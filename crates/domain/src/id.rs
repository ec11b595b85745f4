//! Typed identifier newtypes backed by UUIDs.
//!
//! [`EntityId`] is the kind-erased identifier the storage contract is keyed
//! by. The foreign-key ids are typed so a reptile cannot accidentally point
//! its `reptileTypeID` at a feeding box; they convert losslessly to and from
//! [`EntityId`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
    ($(#[doc = $doc:expr])* $name:ident => erased) => {
        define_id!($(#[doc = $doc])* $name);

        impl From<$name> for EntityId {
            fn from(id: $name) -> Self {
                EntityId::from_uuid(id.as_uuid())
            }
        }

        impl From<EntityId> for $name {
            fn from(id: EntityId) -> Self {
                Self::from_uuid(id.as_uuid())
            }
        }
    };
}

define_id!(
    /// Opaque identifier of any stored [`Entity`](crate::entity::Entity).
    EntityId
);

define_id!(
    /// Identifier of a [`ReptileType`](crate::entity::ReptileType).
    ReptileTypeId => erased
);

define_id!(
    /// Identifier of a [`ReptileFeedingBox`](crate::entity::ReptileFeedingBox).
    FeedingBoxId => erased
);

define_id!(
    /// Identifier of a slot, a [`ReptileFeedingBoxIndexCollection`](crate::entity::ReptileFeedingBoxIndexCollection).
    SlotId => erased
);

define_id!(
    /// Identifier of a [`Reptile`](crate::entity::Reptile).
    ReptileId => erased
);

/// The owning principal of an entity, supplied by the identity provider.
///
/// Treated as an opaque string: no authorization logic lives here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
