//! HTTP client for the hosted backend
//!
//! Implements the core [`AuthProvider`] and [`DataProvider`] capabilities on
//! top of the backend's auth and table REST APIs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use youthnet_core::{
    ActionKind, AdminActionRow, AuthChange, AuthEvent, AuthProvider, AuthUser, BlogPostRow,
    DataProvider, EventRegistrationRow, NewAdminAction, NewMemberRow, Profile, ReadReceipt,
    Session, SourceKind,
};

use crate::error::{Error, Result};
use crate::query::Select;
use crate::token::{decode_claims, error_message, TokenResponse};

/// Refresh the access token this long before it expires
const REFRESH_MARGIN_SECS: i64 = 60;

/// How often the refresh task re-checks when there is nothing to refresh
const IDLE_CHECK: Duration = Duration::from_secs(30);

/// Back-off after a failed refresh attempt
const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Capacity of the auth event channel
const EVENT_CAPACITY: usize = 32;

/// Connection settings for the hosted backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub url: String,
    /// Public (anon) API key
    pub anon_key: String,
}

/// Client handle for backend operations
pub struct BackendClient {
    http: reqwest::Client,
    config: BackendConfig,
    state: Arc<RwLock<ClientState>>,
    events: broadcast::Sender<AuthChange>,
}

#[derive(Default)]
struct ClientState {
    session: Option<Session>,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            http: reqwest::Client::new(),
            config,
            state: Arc::new(RwLock::new(ClientState::default())),
            events,
        }
    }

    fn base(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base(), path)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base(), path)
    }

    /// Session currently held by the client
    pub async fn current_session(&self) -> Option<Session> {
        self.state.read().await.session.clone()
    }

    async fn set_current(&self, session: Option<Session>) {
        self.state.write().await.session = session;
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        // No subscribers is fine
        let _ = self.events.send(AuthChange::new(event, session));
    }

    /// Attach the API key and a bearer token (user token, else anon key)
    async fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self
            .state
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.config.anon_key.clone());
        builder
            .header("apikey", &self.config.anon_key)
            .header(AUTHORIZATION, format!("Bearer {}", token))
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Status {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn request_token(&self, grant_type: &str, body: serde_json::Value) -> Result<Session> {
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = Self::check(response).await?.json().await?;
        Ok(token.into_session())
    }

    /// Exchange the refresh token for a new session.
    ///
    /// A refresh rejected by the backend ends the session locally and is
    /// announced as `SignedOut` without a session.
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> Result<Session> {
        let refresh_token = self
            .current_session()
            .await
            .map(|s| s.refresh_token)
            .ok_or(Error::NotAuthenticated)?;

        match self
            .request_token(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await
        {
            Ok(session) => {
                debug!(user_id = %session.user.id, "Access token refreshed");
                self.set_current(Some(session.clone())).await;
                self.emit(AuthEvent::TokenRefreshed, Some(session.clone()));
                Ok(session)
            }
            Err(e @ Error::Status {
                status: 400 | 401, ..
            }) => {
                warn!(error = %e, "Refresh rejected, session is over");
                self.set_current(None).await;
                self.emit(AuthEvent::SignedOut, None);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Keep the access token fresh until cancelled
    pub fn spawn_auto_refresh(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Token auto-refresh started");
            loop {
                let wait = match self.current_session().await {
                    Some(session) => {
                        let due = session.expires_at - chrono::Duration::seconds(REFRESH_MARGIN_SECS);
                        (due - Utc::now()).to_std().unwrap_or(Duration::ZERO).min(IDLE_CHECK)
                    }
                    None => IDLE_CHECK,
                };

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                let due = match self.current_session().await {
                    Some(session) => {
                        session.expires_at - chrono::Duration::seconds(REFRESH_MARGIN_SECS)
                            <= Utc::now()
                    }
                    None => false,
                };
                if !due {
                    continue;
                }

                if let Err(e) = self.refresh_session().await {
                    warn!(error = %e, "Token refresh failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
            info!("Token auto-refresh stopped");
        })
    }

    async fn select<T: DeserializeOwned>(&self, query: &Select) -> Result<Vec<T>> {
        let builder = self
            .http
            .get(self.rest_url(query.table()))
            .query(&query.to_pairs());
        let response = self.authorize(builder).await.send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn select_one<T: DeserializeOwned>(&self, query: &Select) -> Result<T> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.pgrst.object+json"),
        );
        let builder = self
            .http
            .get(self.rest_url(query.table()))
            .headers(headers)
            .query(&query.to_pairs());
        let response = self.authorize(builder).await.send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post_rest(&self, path: &str, body: &serde_json::Value) -> Result<()> {
        let builder = self
            .http
            .post(self.rest_url(path))
            .header("Prefer", "return=minimal")
            .json(body);
        let response = self.authorize(builder).await.send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for BackendClient {
    async fn get_session(&self) -> youthnet_core::Result<Option<Session>> {
        let Some(session) = self.current_session().await else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }
        match self.refresh_session().await {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(error = %e, "Stored session expired and could not be refreshed");
                Ok(None)
            }
        }
    }

    async fn get_current_user(&self) -> youthnet_core::Result<Option<AuthUser>> {
        if self.current_session().await.is_none() {
            return Ok(None);
        }
        let builder = self.http.get(self.auth_url("user"));
        let response = self.authorize(builder).await.send().await.map_err(Error::from)?;
        let user: AuthUser = Self::check(response).await?.json().await.map_err(Error::from)?;
        Ok(Some(user))
    }

    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> youthnet_core::Result<Session> {
        let session = self
            .request_token(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        info!(user_id = %session.user.id, "Signed in");
        self.set_current(Some(session.clone())).await;
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> youthnet_core::Result<()> {
        let remote = match self.current_session().await {
            Some(_) => {
                let builder = self.http.post(self.auth_url("logout"));
                match self.authorize(builder).await.send().await {
                    Ok(response) => Self::check(response).await.map(|_| ()),
                    Err(e) => Err(Error::from(e)),
                }
            }
            None => Ok(()),
        };

        // Local state ends regardless of the remote outcome
        self.set_current(None).await;
        self.emit(AuthEvent::SignedOut, None);
        remote.map_err(Into::into)
    }

    async fn set_session(&self, session: &Session) -> youthnet_core::Result<()> {
        let claims = decode_claims(&session.access_token)?;
        if claims.sub != session.user.id.to_string() {
            return Err(Error::InvalidToken(format!(
                "token subject {} does not match user {}",
                claims.sub, session.user.id
            ))
            .into());
        }
        self.set_current(Some(session.clone())).await;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}

#[async_trait]
impl DataProvider for BackendClient {
    async fn fetch_profile(&self, user_id: Uuid) -> youthnet_core::Result<Profile> {
        let query = Select::from("profiles")
            .columns("id,full_name,role,avatar_url")
            .eq("id", user_id);
        Ok(self.select_one(&query).await?)
    }

    async fn insert_admin_action(&self, action: &NewAdminAction) -> youthnet_core::Result<()> {
        let body = serde_json::to_value(action)?;
        Ok(self.post_rest("admin_actions", &body).await?)
    }

    async fn recent_new_members(&self, limit: u32) -> youthnet_core::Result<Vec<NewMemberRow>> {
        let query = Select::from("profiles")
            .columns("id,full_name,email,created_at")
            .order_desc("created_at")
            .limit(limit);
        Ok(self.select(&query).await?)
    }

    async fn recent_admin_actions(
        &self,
        kinds: &[ActionKind],
        limit: u32,
    ) -> youthnet_core::Result<Vec<AdminActionRow>> {
        let query = Select::from("admin_actions")
            .columns("id,user_id,action,details,created_at")
            .is_in("action", kinds.iter().map(ActionKind::as_str))
            .order_desc("created_at")
            .limit(limit);
        Ok(self.select(&query).await?)
    }

    async fn recent_published_posts(&self, limit: u32) -> youthnet_core::Result<Vec<BlogPostRow>> {
        let query = Select::from("blogs")
            .columns("id,title,author,created_at")
            .eq("status", "published")
            .order_desc("created_at")
            .limit(limit);
        Ok(self.select(&query).await?)
    }

    async fn recent_event_registrations(
        &self,
        limit: u32,
    ) -> youthnet_core::Result<Vec<EventRegistrationRow>> {
        let query = Select::from("event_registrations")
            .columns("id,full_name,email,created_at,events(title)")
            .order_desc("created_at")
            .limit(limit);
        Ok(self.select(&query).await?)
    }

    async fn read_receipts(&self, actor_id: Uuid) -> youthnet_core::Result<Vec<ReadReceipt>> {
        let query = Select::from("notification_reads")
            .columns("notification_type,source_id")
            .eq("user_id", actor_id);
        Ok(self.select(&query).await?)
    }

    async fn mark_notification_read(
        &self,
        actor_id: Uuid,
        kind: SourceKind,
        source_id: &str,
    ) -> youthnet_core::Result<()> {
        let body = serde_json::json!({
            "p_user_id": actor_id,
            "p_notification_type": kind.as_str(),
            "p_source_id": source_id,
        });
        Ok(self.post_rest("rpc/mark_notification_read", &body).await?)
    }
}
