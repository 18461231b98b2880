//! In-memory providers for exercising the session and notification layers

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;
use youthnet_core::{
    ActionKind, AdminActionRow, AuthChange, AuthEvent, AuthProvider, AuthUser, BlogPostRow,
    DataProvider, Error, EventRegistrationRow, NewAdminAction, NewMemberRow, Profile,
    ReadReceipt, Result, Role, Session, SourceKind,
};

use crate::navigation::Navigator;

pub fn session_for(id: Uuid) -> Session {
    Session {
        access_token: format!("access-{}", id),
        refresh_token: format!("refresh-{}", id),
        expires_at: Utc::now() + ChronoDuration::hours(1),
        user: AuthUser {
            id,
            email: Some("admin@youthnet.org".to_string()),
        },
    }
}

pub fn profile_with_role(id: Uuid, role: Role) -> Profile {
    Profile {
        id,
        full_name: Some("Test Person".to_string()),
        role,
        avatar_url: None,
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutBehavior {
    Succeed,
    Fail,
    Hang,
}

pub struct MockAuth {
    session: Mutex<Option<Session>>,
    sign_in_session: Mutex<Option<Session>>,
    sign_in_delay: Mutex<Duration>,
    sign_out_behavior: Mutex<SignOutBehavior>,
    events: broadcast::Sender<AuthChange>,
    pub get_session_calls: AtomicUsize,
    pub set_session_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
}

impl MockAuth {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            session: Mutex::new(None),
            sign_in_session: Mutex::new(None),
            sign_in_delay: Mutex::new(Duration::ZERO),
            sign_out_behavior: Mutex::new(SignOutBehavior::Succeed),
            events,
            get_session_calls: AtomicUsize::new(0),
            set_session_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    /// Session the provider reports as current
    pub fn set_remote_session(&self, session: Option<Session>) {
        *self.session.lock().unwrap() = session;
    }

    /// Session handed out on sign-in; `None` rejects the credentials
    pub fn accept_sign_in(&self, session: Option<Session>) {
        *self.sign_in_session.lock().unwrap() = session;
    }

    pub fn set_sign_in_delay(&self, delay: Duration) {
        *self.sign_in_delay.lock().unwrap() = delay;
    }

    pub fn set_sign_out_behavior(&self, behavior: SignOutBehavior) {
        *self.sign_out_behavior.lock().unwrap() = behavior;
    }

    pub fn emit(&self, change: AuthChange) {
        let _ = self.events.send(change);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for MockAuth {
    async fn get_session(&self) -> Result<Option<Session>> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.session.lock().unwrap().clone())
    }

    async fn get_current_user(&self) -> Result<Option<AuthUser>> {
        Ok(self.session.lock().unwrap().as_ref().map(|s| s.user.clone()))
    }

    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<Session> {
        let delay = *self.sign_in_delay.lock().unwrap();
        pause(delay).await;
        let session = self
            .sign_in_session
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Authentication("Invalid login credentials".to_string()))?;
        *self.session.lock().unwrap() = Some(session.clone());
        self.emit(AuthChange::new(AuthEvent::SignedIn, Some(session.clone())));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.sign_out_behavior.lock().unwrap();
        match behavior {
            SignOutBehavior::Succeed => {
                *self.session.lock().unwrap() = None;
                self.emit(AuthChange::new(AuthEvent::SignedOut, None));
                Ok(())
            }
            SignOutBehavior::Fail => Err(Error::Provider("logout failed".to_string())),
            SignOutBehavior::Hang => std::future::pending().await,
        }
    }

    async fn set_session(&self, session: &Session) -> Result<()> {
        self.set_session_calls.fetch_add(1, Ordering::SeqCst);
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}

#[derive(Default)]
struct Feeds {
    members: Vec<NewMemberRow>,
    alerts: Vec<AdminActionRow>,
    posts: Vec<BlogPostRow>,
    registrations: Vec<EventRegistrationRow>,
    receipts: Vec<ReadReceipt>,
}

pub struct MockData {
    profiles: Mutex<HashMap<Uuid, Profile>>,
    profile_delay: Mutex<Duration>,
    fail_profile: AtomicBool,
    profile_fetches: AtomicUsize,
    actions: Mutex<Vec<NewAdminAction>>,
    audit_delay: Mutex<Duration>,
    fail_audit: AtomicBool,
    feeds: Mutex<Feeds>,
    fail_feeds: AtomicBool,
    fail_receipts: AtomicBool,
    upserts: Mutex<Vec<(Uuid, SourceKind, String)>>,
    upsert_delay: Mutex<Duration>,
    fail_upserts: AtomicBool,
}

impl MockData {
    pub fn new() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
            profile_delay: Mutex::new(Duration::ZERO),
            fail_profile: AtomicBool::new(false),
            profile_fetches: AtomicUsize::new(0),
            actions: Mutex::new(Vec::new()),
            audit_delay: Mutex::new(Duration::ZERO),
            fail_audit: AtomicBool::new(false),
            feeds: Mutex::new(Feeds::default()),
            fail_feeds: AtomicBool::new(false),
            fail_receipts: AtomicBool::new(false),
            upserts: Mutex::new(Vec::new()),
            upsert_delay: Mutex::new(Duration::ZERO),
            fail_upserts: AtomicBool::new(false),
        }
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.profiles.lock().unwrap().insert(profile.id, profile);
    }

    pub fn set_profile_delay(&self, delay: Duration) {
        *self.profile_delay.lock().unwrap() = delay;
    }

    pub fn set_fail_profile(&self, fail: bool) {
        self.fail_profile.store(fail, Ordering::SeqCst);
    }

    pub fn profile_fetches(&self) -> usize {
        self.profile_fetches.load(Ordering::SeqCst)
    }

    pub fn set_audit_delay(&self, delay: Duration) {
        *self.audit_delay.lock().unwrap() = delay;
    }

    pub fn set_fail_audit(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    pub fn actions(&self) -> Vec<NewAdminAction> {
        self.actions.lock().unwrap().clone()
    }

    pub fn actions_of(&self, kind: ActionKind) -> Vec<NewAdminAction> {
        self.actions()
            .into_iter()
            .filter(|a| a.action == kind)
            .collect()
    }

    pub fn set_members(&self, rows: Vec<NewMemberRow>) {
        self.feeds.lock().unwrap().members = rows;
    }

    pub fn set_alerts(&self, rows: Vec<AdminActionRow>) {
        self.feeds.lock().unwrap().alerts = rows;
    }

    pub fn set_posts(&self, rows: Vec<BlogPostRow>) {
        self.feeds.lock().unwrap().posts = rows;
    }

    pub fn set_registrations(&self, rows: Vec<EventRegistrationRow>) {
        self.feeds.lock().unwrap().registrations = rows;
    }

    pub fn set_receipts(&self, rows: Vec<ReadReceipt>) {
        self.feeds.lock().unwrap().receipts = rows;
    }

    pub fn set_fail_feeds(&self, fail: bool) {
        self.fail_feeds.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_receipts(&self, fail: bool) {
        self.fail_receipts.store(fail, Ordering::SeqCst);
    }

    pub fn upserts(&self) -> Vec<(Uuid, SourceKind, String)> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn set_upsert_delay(&self, delay: Duration) {
        *self.upsert_delay.lock().unwrap() = delay;
    }

    pub fn set_fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    fn check_feeds(&self) -> Result<()> {
        if self.fail_feeds.load(Ordering::SeqCst) {
            return Err(Error::Provider("feed unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DataProvider for MockData {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Profile> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.profile_delay.lock().unwrap();
        pause(delay).await;
        if self.fail_profile.load(Ordering::SeqCst) {
            return Err(Error::Provider("profile query failed".to_string()));
        }
        self.profiles
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("profile {}", user_id)))
    }

    async fn insert_admin_action(&self, action: &NewAdminAction) -> Result<()> {
        let delay = *self.audit_delay.lock().unwrap();
        pause(delay).await;
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(Error::Provider("insert rejected".to_string()));
        }
        self.actions.lock().unwrap().push(action.clone());
        Ok(())
    }

    async fn recent_new_members(&self, limit: u32) -> Result<Vec<NewMemberRow>> {
        self.check_feeds()?;
        let feeds = self.feeds.lock().unwrap();
        Ok(feeds.members.iter().take(limit as usize).cloned().collect())
    }

    async fn recent_admin_actions(
        &self,
        kinds: &[ActionKind],
        limit: u32,
    ) -> Result<Vec<AdminActionRow>> {
        self.check_feeds()?;
        let feeds = self.feeds.lock().unwrap();
        Ok(feeds
            .alerts
            .iter()
            .filter(|row| kinds.contains(&row.action))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn recent_published_posts(&self, limit: u32) -> Result<Vec<BlogPostRow>> {
        self.check_feeds()?;
        let feeds = self.feeds.lock().unwrap();
        Ok(feeds.posts.iter().take(limit as usize).cloned().collect())
    }

    async fn recent_event_registrations(&self, limit: u32) -> Result<Vec<EventRegistrationRow>> {
        self.check_feeds()?;
        let feeds = self.feeds.lock().unwrap();
        Ok(feeds
            .registrations
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn read_receipts(&self, _actor_id: Uuid) -> Result<Vec<ReadReceipt>> {
        if self.fail_receipts.load(Ordering::SeqCst) {
            return Err(Error::Provider("receipts unavailable".to_string()));
        }
        Ok(self.feeds.lock().unwrap().receipts.clone())
    }

    async fn mark_notification_read(
        &self,
        actor_id: Uuid,
        kind: SourceKind,
        source_id: &str,
    ) -> Result<()> {
        let delay = *self.upsert_delay.lock().unwrap();
        pause(delay).await;
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(Error::Provider("rpc failed".to_string()));
        }
        self.upserts
            .lock()
            .unwrap()
            .push((actor_id, kind, source_id.to_string()));
        Ok(())
    }
}

/// Navigator that remembers every redirect
pub struct RecordingNavigator {
    path: Mutex<String>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn at(path: &str) -> Self {
        Self {
            path: Mutex::new(path.to_string()),
            redirects: Mutex::new(Vec::new()),
        }
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        self.path.lock().unwrap().clone()
    }

    fn redirect(&self, path: &str) {
        *self.path.lock().unwrap() = path.to_string();
        self.redirects.lock().unwrap().push(path.to_string());
    }
}
