//! Admin action (audit trail) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of security-relevant event recorded in `admin_actions`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Login,
    FailedLogin,
    Logout,
    TokenRefresh,
    SessionExpired,
    AccessDenied,
    /// Any action written by the CRUD screens (create_blog, delete_event, ...)
    #[serde(other)]
    Other,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Login => "login",
            ActionKind::FailedLogin => "failed_login",
            ActionKind::Logout => "logout",
            ActionKind::TokenRefresh => "token_refresh",
            ActionKind::SessionExpired => "session_expired",
            ActionKind::AccessDenied => "access_denied",
            ActionKind::Other => "other",
        }
    }

    /// Kinds surfaced as security alerts in the notification feed
    pub fn security_alerts() -> &'static [ActionKind] {
        &[
            ActionKind::FailedLogin,
            ActionKind::AccessDenied,
            ActionKind::SessionExpired,
        ]
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An audit record to be written. `user_id` is `None` for anonymous or
/// failed actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAdminAction {
    pub user_id: Option<Uuid>,
    pub action: ActionKind,
    pub details: serde_json::Value,
}

impl NewAdminAction {
    pub fn new(user_id: Option<Uuid>, action: ActionKind, details: serde_json::Value) -> Self {
        Self {
            user_id,
            action,
            details,
        }
    }
}

/// An audit record as read back from the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminActionRow {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub action: ActionKind,
    #[serde(default)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AdminActionRow {
    /// Email mentioned in the details payload, if any
    pub fn detail_email(&self) -> Option<&str> {
        self.details.get("email").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&ActionKind::FailedLogin).unwrap(),
            "\"failed_login\""
        );
        for kind in ActionKind::security_alerts() {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_unknown_action_kind() {
        let kind: ActionKind = serde_json::from_str("\"create_blog\"").unwrap();
        assert_eq!(kind, ActionKind::Other);
    }

    #[test]
    fn test_detail_email() {
        let row = AdminActionRow {
            id: Uuid::new_v4(),
            user_id: None,
            action: ActionKind::FailedLogin,
            details: serde_json::json!({ "email": "someone@example.org" }),
            created_at: Utc::now(),
        };
        assert_eq!(row.detail_email(), Some("someone@example.org"));
    }
}
