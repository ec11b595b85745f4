//! Identity port — who owns the entities being created.

use std::sync::Arc;

use terrarium_domain::id::UserId;

/// Supplies the `userID` attached to newly created entities.
///
/// The value is opaque; no authorization is derived from it.
pub trait IdentityProvider: Send + Sync {
    /// The principal acting right now, if any.
    fn current_user(&self) -> Option<UserId>;
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    fn current_user(&self) -> Option<UserId> {
        (**self).current_user()
    }
}

/// Identity fixed at construction, read from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<UserId>,
}

impl StaticIdentity {
    #[must_use]
    pub fn new(user: Option<UserId>) -> Self {
        Self { user }
    }

    /// No principal; created entities carry no `userID`.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user.clone()
    }
}
