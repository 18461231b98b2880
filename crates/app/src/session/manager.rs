//! Session manager
//!
//! Owns the authenticated session for the admin console. It restores a
//! cached session on startup, gates sign-in on the admin role, tears the
//! session down within a bounded time on sign-out, and writes an audit
//! record for every security-relevant transition.
//!
//! State is published through a `watch` channel. Profile fetches run under
//! a cancellation generation: sign-out cancels the generation, so a fetch
//! still in flight is dropped and never writes state afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use youthnet_core::{
    ActionKind, AuthChange, AuthEvent, AuthProvider, DataProvider, Database, Error,
    PermissionMatrix, Profile, Result, Session,
};

use super::audit::AuditTrail;
use crate::navigation::{Navigator, LOGIN_PATH};
use crate::state::AuthState;

/// Upper bounds on the remote calls the session lifecycle depends on
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTimeouts {
    pub profile_fetch: Duration,
    /// Sign-out finalizes locally after this long even if the backend hangs
    pub sign_out_fallback: Duration,
    /// Pause after a successful remote sign-out before finalizing
    pub sign_out_transition: Duration,
    pub login: Duration,
    /// Minimum spacing between profile re-checks in `refresh_user`
    pub profile_refresh_interval: Duration,
    pub audit_write: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            profile_fetch: Duration::from_secs(15),
            sign_out_fallback: Duration::from_secs(5),
            sign_out_transition: Duration::from_secs(2),
            login: Duration::from_secs(10),
            profile_refresh_interval: Duration::from_secs(30),
            audit_write: Duration::from_secs(5),
        }
    }
}

pub struct SessionManager {
    auth: Arc<dyn AuthProvider>,
    data: Arc<dyn DataProvider>,
    db: Arc<Mutex<Database>>,
    navigator: Arc<dyn Navigator>,
    audit: AuditTrail,
    timeouts: SessionTimeouts,
    state: watch::Sender<AuthState>,
    /// Latched for the whole duration of a sign-out
    signing_out: AtomicBool,
    /// Set when we asked for the sign-out, consumed by the next `SignedOut` event
    manual_sign_out: AtomicBool,
    /// Latched while a non-admin session is being revoked
    rejecting: AtomicBool,
    last_profile_check: Mutex<Option<Instant>>,
    generation: Mutex<CancellationToken>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl SessionManager {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        data: Arc<dyn DataProvider>,
        db: Arc<Mutex<Database>>,
        navigator: Arc<dyn Navigator>,
        timeouts: SessionTimeouts,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::initial());
        Self {
            audit: AuditTrail::new(data.clone(), timeouts.audit_write),
            auth,
            data,
            db,
            navigator,
            timeouts,
            state,
            signing_out: AtomicBool::new(false),
            manual_sign_out: AtomicBool::new(false),
            rejecting: AtomicBool::new(false),
            last_profile_check: Mutex::new(None),
            generation: Mutex::new(CancellationToken::new()),
        }
    }

    /// Observe auth state changes
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Current auth state
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_user_id(&self) -> Option<Uuid> {
        self.state.borrow().actor_id()
    }

    pub fn is_signing_out(&self) -> bool {
        self.signing_out.load(Ordering::SeqCst)
    }

    /// A session is being torn down and must not be restored or refreshed
    fn session_closing(&self) -> bool {
        self.is_signing_out() || self.rejecting.load(Ordering::SeqCst)
    }

    /// Path to return to after login, recorded by the last sign-out.
    /// Reading it clears it.
    pub fn take_return_path(&self) -> Option<String> {
        match lock(&self.db).session_cache().take_return_path() {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Failed to read return path");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Restore
    // ------------------------------------------------------------------

    /// Re-establish the session at startup or after a provider event.
    ///
    /// Always leaves `loading` false, falling back to signed out on error.
    #[instrument(skip(self))]
    pub async fn restore_session(&self) {
        let token = self.current_generation();
        if let Err(e) = self.try_restore(&token).await {
            warn!(error = %e, "Session restore failed, continuing signed out");
            self.commit(&token, |state| *state = AuthState::signed_out());
        }
        self.state.send_modify(|state| state.loading = false);
    }

    async fn try_restore(&self, token: &CancellationToken) -> Result<()> {
        let session = match self.load_cached_session() {
            Some(session) => match self.auth.set_session(&session).await {
                Ok(()) => Some(session),
                Err(e) => {
                    warn!(error = %e, "Backend rejected cached session");
                    self.clear_cached_session();
                    self.remote_session(token).await?
                }
            },
            None => self.remote_session(token).await?,
        };

        let Some(session) = session else {
            debug!("No session to restore");
            self.commit(token, |state| *state = AuthState::signed_out());
            return Ok(());
        };

        let user_id = session.user.id;
        let Some(profile) = self.load_profile(token, user_id).await else {
            return Ok(());
        };
        self.mark_profile_checked();
        info!(user_id = %user_id, role = %profile.role, "Session restored");
        self.commit(token, |state| *state = AuthState::signed_in(session, profile));
        Ok(())
    }

    /// Cached session, if it is usable. Unusable blobs are removed.
    fn load_cached_session(&self) -> Option<Session> {
        let db = lock(&self.db);
        let cache = db.session_cache();
        let cached = match cache.load() {
            Ok(cached) => cached?,
            Err(e) => {
                warn!(error = %e, "Failed to read session cache");
                return None;
            }
        };
        match cached.into_valid(Utc::now()) {
            Some(session) => Some(session),
            None => {
                info!("Discarding cached session without user or past expiry");
                if let Err(e) = cache.clear() {
                    warn!(error = %e, "Failed to clear session cache");
                }
                None
            }
        }
    }

    async fn remote_session(&self, token: &CancellationToken) -> Result<Option<Session>> {
        let session = self.auth.get_session().await?;
        if let Some(session) = &session {
            let _generation = lock(&self.generation);
            if !token.is_cancelled() {
                self.cache_session(session);
            }
        }
        Ok(session)
    }

    fn cache_session(&self, session: &Session) {
        if let Err(e) = lock(&self.db).session_cache().save(session) {
            warn!(error = %e, "Failed to cache session");
        }
    }

    fn clear_cached_session(&self) {
        if let Err(e) = lock(&self.db).session_cache().clear() {
            warn!(error = %e, "Failed to clear session cache");
        }
    }

    // ------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------

    fn current_generation(&self) -> CancellationToken {
        lock(&self.generation).clone()
    }

    /// Cancel in-flight profile fetches and start a fresh generation
    fn next_generation(&self) {
        let mut generation = lock(&self.generation);
        generation.cancel();
        *generation = CancellationToken::new();
    }

    /// Apply a state update unless its generation has been cancelled.
    /// Holding the generation lock orders this against `next_generation`.
    fn commit(&self, token: &CancellationToken, update: impl FnOnce(&mut AuthState)) -> bool {
        let _generation = lock(&self.generation);
        if token.is_cancelled() {
            debug!("Dropping state update from a cancelled generation");
            return false;
        }
        self.state.send_modify(update);
        true
    }

    /// Fetch a profile, degrading to the least-privilege fallback on error
    /// or timeout. `None` means the generation was cancelled.
    async fn load_profile(&self, token: &CancellationToken, user_id: Uuid) -> Option<Profile> {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(user_id = %user_id, "Profile fetch cancelled");
                None
            }
            result = timeout(self.timeouts.profile_fetch, self.data.fetch_profile(user_id)) => {
                match result {
                    Ok(Ok(profile)) => Some(profile),
                    Ok(Err(e)) => {
                        warn!(user_id = %user_id, error = %e, "Profile fetch failed, using fallback");
                        Some(Profile::fallback(user_id))
                    }
                    Err(_) => {
                        warn!(user_id = %user_id, "Profile fetch timed out, using fallback");
                        Some(Profile::fallback(user_id))
                    }
                }
            }
        }
    }

    fn mark_profile_checked(&self) {
        *lock(&self.last_profile_check) = Some(Instant::now());
    }

    /// Re-fetch the profile for the current user, at most once per
    /// refresh interval. Returns whether a fetch was made.
    pub async fn refresh_user(&self) -> bool {
        let Some(user_id) = self.current_user_id() else {
            return false;
        };

        {
            let mut last = lock(&self.last_profile_check);
            if let Some(at) = *last {
                if at.elapsed() < self.timeouts.profile_refresh_interval {
                    debug!("Profile checked recently, skipping refresh");
                    return false;
                }
            }
            *last = Some(Instant::now());
        }

        let token = self.current_generation();
        if let Some(profile) = self.load_profile(&token, user_id).await {
            self.commit(&token, |state| {
                if state.actor_id() == Some(user_id) {
                    state.is_admin = PermissionMatrix::is_admin(profile.role);
                    state.profile = Some(profile);
                }
            });
        }
        true
    }

    // ------------------------------------------------------------------
    // Sign in
    // ------------------------------------------------------------------

    /// Sign in with email and password. Only admins get a session.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Profile> {
        let token = self.current_generation();

        let attempt = timeout(
            self.timeouts.login,
            self.auth.sign_in_with_password(email, password),
        )
        .await
        .unwrap_or_else(|_| Err(Error::Timeout("sign-in".to_string())));

        let session = match attempt {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                self.audit
                    .record(
                        None,
                        ActionKind::FailedLogin,
                        json!({ "email": email, "reason": e.to_string() }),
                    )
                    .await;
                return Err(e);
            }
        };

        let user_id = session.user.id;
        let profile = self
            .load_profile(&token, user_id)
            .await
            .ok_or(Error::Cancelled)?;

        if !PermissionMatrix::is_admin(profile.role) {
            warn!(user_id = %user_id, role = %profile.role, "Non-admin sign-in rejected");
            self.audit
                .record(
                    Some(user_id),
                    ActionKind::AccessDenied,
                    json!({ "email": email, "role": profile.role }),
                )
                .await;
            self.rejecting.store(true, Ordering::SeqCst);
            self.manual_sign_out.store(true, Ordering::SeqCst);
            self.next_generation();
            match timeout(self.timeouts.sign_out_fallback, self.auth.sign_out()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Failed to revoke rejected session"),
                Err(_) => warn!(
                    fallback = ?self.timeouts.sign_out_fallback,
                    "Revoking rejected session timed out"
                ),
            }
            self.clear_cached_session();
            self.state.send_replace(AuthState::signed_out());
            self.rejecting.store(false, Ordering::SeqCst);
            return Err(Error::AccessDenied("Admin privileges required".to_string()));
        }

        self.manual_sign_out.store(false, Ordering::SeqCst);
        self.cache_session(&session);
        self.mark_profile_checked();
        if !self.commit(&token, |state| {
            *state = AuthState::signed_in(session, profile.clone())
        }) {
            return Err(Error::Cancelled);
        }

        info!(user_id = %user_id, "Signed in");
        self.audit
            .record(Some(user_id), ActionKind::Login, json!({ "email": email }))
            .await;
        Ok(profile)
    }

    // ------------------------------------------------------------------
    // Sign out
    // ------------------------------------------------------------------

    /// Sign out. A second call while one is in flight does nothing.
    ///
    /// Local state is always cleared within `sign_out_fallback`, whatever
    /// the backend does.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        if self
            .signing_out
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Sign-out already in progress");
            return;
        }

        let deadline = Instant::now() + self.timeouts.sign_out_fallback;
        self.manual_sign_out.store(true, Ordering::SeqCst);
        self.next_generation();

        let actor = self.current_user_id();
        if actor.is_some() {
            let logged = timeout_at(
                deadline,
                self.audit.record(actor, ActionKind::Logout, json!({})),
            )
            .await;
            if logged.is_err() {
                warn!("Logout audit outlived the sign-out deadline");
            }
        }

        self.clear_cached_session();

        let remote = async {
            match self.auth.sign_out().await {
                Ok(()) => sleep(self.timeouts.sign_out_transition).await,
                Err(e) => warn!(error = %e, "Remote sign-out failed"),
            }
        };

        tokio::select! {
            biased;
            _ = remote => {}
            _ = sleep_until(deadline) => {
                warn!(fallback = ?self.timeouts.sign_out_fallback, "Remote sign-out did not settle, finalizing locally");
            }
        }

        self.finalize_sign_out();
        self.signing_out.store(false, Ordering::SeqCst);
    }

    fn finalize_sign_out(&self) {
        self.clear_cached_session();
        self.state.send_replace(AuthState::signed_out());
        *lock(&self.last_profile_check) = None;

        let current = self.navigator.current_path();
        if current != LOGIN_PATH {
            if let Err(e) = lock(&self.db).session_cache().set_return_path(&current) {
                warn!(error = %e, "Failed to record return path");
            }
            self.navigator.redirect(LOGIN_PATH);
        }
        info!("Signed out");
    }

    // ------------------------------------------------------------------
    // Provider events
    // ------------------------------------------------------------------

    /// React to a provider-pushed auth change
    #[instrument(skip(self, change), fields(event = ?change.event))]
    pub async fn handle_auth_change(&self, change: AuthChange) {
        match change.event {
            AuthEvent::TokenRefreshed => {
                let actor = {
                    let _generation = lock(&self.generation);
                    match (self.current_user_id(), change.session) {
                        _ if self.session_closing() => None,
                        (Some(current), Some(session)) if session.user.id == current => {
                            self.cache_session(&session);
                            self.state.send_modify(|state| state.session = Some(session));
                            Some(current)
                        }
                        (Some(current), None) => Some(current),
                        _ => None,
                    }
                };
                match actor {
                    Some(actor) => {
                        self.audit
                            .record(Some(actor), ActionKind::TokenRefresh, json!({}))
                            .await;
                    }
                    None => debug!("Ignoring token refresh without a matching active session"),
                }
            }
            AuthEvent::SignedOut => {
                let manual = self.manual_sign_out.swap(false, Ordering::SeqCst);
                if change.session.is_none() && !manual {
                    if let Some(actor) = self.current_user_id() {
                        info!(user_id = %actor, "Session expired");
                        self.audit
                            .record(
                                Some(actor),
                                ActionKind::SessionExpired,
                                json!({ "reason": "signed_out_without_session" }),
                            )
                            .await;
                    }
                }
                if !self.session_closing() {
                    self.restore_session().await;
                }
            }
            AuthEvent::SignedIn | AuthEvent::UserUpdated => {
                if !self.session_closing() {
                    self.restore_session().await;
                }
            }
        }
    }

    /// Run the provider event subscription as a background task
    pub fn spawn_auth_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.auth.subscribe();
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(change) => manager.handle_auth_change(change).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth listener lagged behind provider events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Auth event channel closed");
                        break;
                    }
                }
            }
        })
    }
}
