//! Notification models for the admin activity feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ActionKind, AdminActionRow, BlogPostRow, EventRegistrationRow, NewMemberRow};

/// Display severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Backend table a notification was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Profile,
    Action,
    Blog,
    Event,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Profile => "profile",
            SourceKind::Action => "action",
            SourceKind::Blog => "blog",
            SourceKind::Event => "event",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic notification id: `{kind}-{source_id}`
pub fn notification_id(kind: SourceKind, source_id: &str) -> String {
    format!("{}-{}", kind, source_id)
}

/// One entry of the unified feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationItem {
    pub id: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub severity: Severity,
    pub link: Option<String>,
    pub source_kind: SourceKind,
    pub source_id: String,
}

/// A raw feed row tagged with the table it came from
#[derive(Debug, Clone)]
pub enum NotificationSource {
    NewMember(NewMemberRow),
    SecurityAlert(AdminActionRow),
    PublishedPost(BlogPostRow),
    EventRegistration(EventRegistrationRow),
}

impl NotificationSource {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            NotificationSource::NewMember(_) => SourceKind::Profile,
            NotificationSource::SecurityAlert(_) => SourceKind::Action,
            NotificationSource::PublishedPost(_) => SourceKind::Blog,
            NotificationSource::EventRegistration(_) => SourceKind::Event,
        }
    }

    /// Map the row into the common display shape (unread)
    pub fn into_item(self) -> NotificationItem {
        let kind = self.source_kind();
        let (source_id, title, message, severity, link, timestamp) = match self {
            NotificationSource::NewMember(row) => {
                let name = row
                    .full_name
                    .as_deref()
                    .or(row.email.as_deref())
                    .unwrap_or("A new member");
                (
                    row.id.to_string(),
                    "New member joined".to_string(),
                    format!("{} just joined the network", name),
                    Severity::Success,
                    "/admin/users",
                    row.created_at,
                )
            }
            NotificationSource::SecurityAlert(row) => {
                let who = row.detail_email().unwrap_or("an unknown account");
                let (title, message, severity) = match row.action {
                    ActionKind::FailedLogin => (
                        "Failed login attempt",
                        format!("Failed sign-in for {}", who),
                        Severity::Warning,
                    ),
                    ActionKind::AccessDenied => (
                        "Unauthorized access attempt",
                        format!("{} tried to open the admin panel", who),
                        Severity::Error,
                    ),
                    ActionKind::SessionExpired => (
                        "Session expired",
                        "An admin session expired".to_string(),
                        Severity::Info,
                    ),
                    other => (
                        "Security event",
                        format!("Recorded {}", other),
                        Severity::Info,
                    ),
                };
                (
                    row.id.to_string(),
                    title.to_string(),
                    message,
                    severity,
                    "/admin/activity",
                    row.created_at,
                )
            }
            NotificationSource::PublishedPost(row) => (
                row.id.to_string(),
                "New blog post published".to_string(),
                format!("\"{}\" is now live", row.title),
                Severity::Info,
                "/admin/blogs",
                row.created_at,
            ),
            NotificationSource::EventRegistration(row) => (
                row.id.to_string(),
                "New event registration".to_string(),
                format!("{} registered for {}", row.registrant(), row.event_title()),
                Severity::Success,
                "/admin/events",
                row.created_at,
            ),
        };

        NotificationItem {
            id: notification_id(kind, &source_id),
            title,
            message,
            timestamp,
            read: false,
            severity,
            link: Some(link.to_string()),
            source_kind: kind,
            source_id,
        }
    }
}

/// A read receipt: the actor has acknowledged this source item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub notification_type: SourceKind,
    pub source_id: String,
}

impl ReadReceipt {
    pub fn notification_id(&self) -> String {
        notification_id(self.notification_type, &self.source_id)
    }
}
