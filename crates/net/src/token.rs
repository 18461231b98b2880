//! Auth token payloads
//!
//! Token endpoint responses, JWT claim decoding and error body parsing.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use youthnet_core::{AuthUser, Session};

use crate::error::{Error, Result};

/// Lifetime assumed when the backend reports no expiry at all
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Response of `POST /auth/v1/token`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl TokenResponse {
    /// Build a session. Expiry comes from `expires_at`, then the JWT `exp`
    /// claim, then `expires_in` relative to now.
    pub fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| {
                decode_claims(&self.access_token)
                    .ok()
                    .and_then(|c| DateTime::from_timestamp(c.exp, 0))
            })
            .unwrap_or_else(|| {
                Utc::now() + Duration::seconds(self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS))
            });

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Claims carried in the access token payload
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Decode (without verifying) the payload segment of a JWT
pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::InvalidToken("missing payload segment".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::InvalidToken(e.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Extract a human-readable message from an error response body
pub fn error_message(body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no details".to_string()
            } else {
                trimmed.to_string()
            }
        })
}

#[cfg(test)]
pub(crate) fn encode_test_token(sub: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "sub": sub, "exp": exp, "role": "authenticated" }).to_string(),
    );
    format!("{}.{}.signature", header, payload)
}
