//! Hosted backend capability traits
//!
//! These traits define the interface to the hosted backend, allowing for
//! different implementations (REST client, in-memory mocks).

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ActionKind, AdminActionRow, AuthUser, BlogPostRow, EventRegistrationRow, NewAdminAction,
    NewMemberRow, Profile, ReadReceipt, Session, SourceKind,
};

/// Auth state transitions pushed by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// An auth event together with the session it produced (if any)
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthChange {
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Authentication operations
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session held by the provider, if any
    async fn get_session(&self) -> Result<Option<Session>>;

    /// User behind the current session, verified with the backend
    async fn get_current_user(&self) -> Result<Option<AuthUser>>;

    /// Check credentials and open a session
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    /// Revoke the current session
    async fn sign_out(&self) -> Result<()>;

    /// Adopt a session restored from local storage
    async fn set_session(&self, session: &Session) -> Result<()>;

    /// Subscribe to auth state changes
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}

/// Tabular query and mutation operations
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetch the profile for a user
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Profile>;

    /// Append an audit record
    async fn insert_admin_action(&self, action: &NewAdminAction) -> Result<()>;

    /// Most recently created profiles
    async fn recent_new_members(&self, limit: u32) -> Result<Vec<NewMemberRow>>;

    /// Most recent audit records of the given kinds
    async fn recent_admin_actions(
        &self,
        kinds: &[ActionKind],
        limit: u32,
    ) -> Result<Vec<AdminActionRow>>;

    /// Most recently published blog posts
    async fn recent_published_posts(&self, limit: u32) -> Result<Vec<BlogPostRow>>;

    /// Most recent event registrations, joined to the event title
    async fn recent_event_registrations(&self, limit: u32) -> Result<Vec<EventRegistrationRow>>;

    /// Read receipts recorded for an actor
    async fn read_receipts(&self, actor_id: Uuid) -> Result<Vec<ReadReceipt>>;

    /// Upsert a read receipt for (actor, kind, source id)
    async fn mark_notification_read(
        &self,
        actor_id: Uuid,
        kind: SourceKind,
        source_id: &str,
    ) -> Result<()>;
}
