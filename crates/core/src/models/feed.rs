//! Source rows for the activity feed
//!
//! Each row mirrors the columns selected from one backend table. They share
//! nothing except a primary key and a creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recently created member profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMemberRow {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A published blog post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPostRow {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Event title embedded through the `events` foreign key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRef {
    pub title: String,
}

/// A registration for an event, joined to the event title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRegistrationRow {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, rename = "events")]
    pub event: Option<EventRef>,
}

impl EventRegistrationRow {
    pub fn registrant(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Someone")
    }

    pub fn event_title(&self) -> &str {
        self.event.as_ref().map_or("an event", |e| e.title.as_str())
    }
}
