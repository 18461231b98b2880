//! Authenticated user and session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity issued by the hosted auth service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Active session for a signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session blob as persisted in local storage.
///
/// Stale or truncated blobs may lack the user reference. A blob without
/// one is never a valid session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<AuthUser>,
    pub cached_at: DateTime<Utc>,
}

impl CachedSession {
    pub fn from_session(session: &Session) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session.expires_at,
            user: Some(session.user.clone()),
            cached_at: Utc::now(),
        }
    }

    /// Convert into a usable session, or `None` if the blob has no user
    /// reference or has already expired.
    pub fn into_valid(self, now: DateTime<Utc>) -> Option<Session> {
        let user = self.user?;
        let session = Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            user,
        };
        (!session.is_expired_at(now)).then_some(session)
    }
}
