//! Observable authentication state

use uuid::Uuid;
use youthnet_core::{AuthUser, Capability, PermissionMatrix, Profile, Session};

/// Snapshot of who is signed in, published to observers on every change
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<AuthUser>,
    pub profile: Option<Profile>,
    pub session: Option<Session>,
    pub is_admin: bool,
    /// True until the first session restore has finished
    pub loading: bool,
}

impl AuthState {
    /// State before the first restore
    pub fn initial() -> Self {
        Self {
            user: None,
            profile: None,
            session: None,
            is_admin: false,
            loading: true,
        }
    }

    /// Fully signed-out state
    pub fn signed_out() -> Self {
        Self {
            loading: false,
            ..Self::initial()
        }
    }

    /// Signed-in state for a session and its profile
    pub fn signed_in(session: Session, profile: Profile) -> Self {
        Self {
            user: Some(session.user.clone()),
            is_admin: PermissionMatrix::is_admin(profile.role),
            profile: Some(profile),
            session: Some(session),
            loading: false,
        }
    }

    /// The acting identity, if any
    pub fn actor_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }

    /// Whether the signed-in profile holds a capability
    pub fn can(&self, capability: Capability) -> bool {
        self.profile
            .as_ref()
            .is_some_and(|p| PermissionMatrix::can_perform(p.role, capability))
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initial()
    }
}
