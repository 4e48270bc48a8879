//! The identity collaborator.
//!
//! The engine consumes identity only to decide guest vs remote mode and to
//! address the correct remote document. Token lifecycle, sign-in UI, and
//! session refresh all belong to the host application.

use std::sync::{Arc, Mutex, PoisonError};

use hillbloom_core::UserId;

/// The signed-in user as reported by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub uid: UserId,
    pub email: Option<String>,
}

impl AuthenticatedUser {
    /// Create a user record from a uid.
    #[must_use]
    pub fn new(uid: impl Into<UserId>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
        }
    }

    /// Attach the account email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Read-only view of the host's authentication state.
pub trait IdentityProvider: Send + Sync + 'static {
    /// The currently signed-in user, if any.
    fn current_user(&self) -> Option<AuthenticatedUser>;

    /// Whether a user is signed in.
    fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }
}

/// Identity provider backed by a mutable slot, for tests and local
/// development. Clones share the slot.
#[derive(Clone, Default)]
pub struct StaticIdentity {
    user: Arc<Mutex<Option<AuthenticatedUser>>>,
}

impl StaticIdentity {
    /// Start signed out.
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Start signed in as the given user.
    #[must_use]
    pub fn signed_in(user: AuthenticatedUser) -> Self {
        let identity = Self::default();
        identity.sign_in(user);
        identity
    }

    /// Sign a user in.
    pub fn sign_in(&self, user: AuthenticatedUser) {
        *self.user.lock().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    /// Sign the current user out.
    pub fn sign_out(&self) {
        *self.user.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<AuthenticatedUser> {
        self.user
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
