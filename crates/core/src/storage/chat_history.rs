//! Chat widget history persistence
//!
//! Stored as a JSON array under a single key, capped to the most recent
//! entries.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::local::LocalStore;
use crate::error::Result;

/// Key of the chat history array
pub const CHAT_HISTORY_KEY: &str = "youthnet.chat.history";

/// Maximum number of entries kept
pub const MAX_CHAT_HISTORY: usize = 50;

/// Who wrote a chat entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatEntry {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Chat history store
pub struct ChatHistoryStore<'a> {
    store: LocalStore<'a>,
}

impl<'a> ChatHistoryStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            store: LocalStore::new(conn),
        }
    }

    /// All entries, oldest first. An unreadable array reads as empty.
    pub fn list(&self) -> Result<Vec<ChatEntry>> {
        match self.store.get_json::<Vec<ChatEntry>>(CHAT_HISTORY_KEY) {
            Ok(entries) => Ok(entries.unwrap_or_default()),
            Err(crate::Error::Serialization(e)) => {
                warn!(error = %e, "Ignoring unreadable chat history");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Append an entry, dropping the oldest beyond the cap
    pub fn append(&self, entry: ChatEntry) -> Result<()> {
        let mut entries = self.list()?;
        entries.push(entry);
        if entries.len() > MAX_CHAT_HISTORY {
            let excess = entries.len() - MAX_CHAT_HISTORY;
            entries.drain(..excess);
        }
        self.store.set_json(CHAT_HISTORY_KEY, &entries)
    }

    /// Forget the whole conversation
    pub fn clear(&self) -> Result<()> {
        self.store.remove(CHAT_HISTORY_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_append_and_list() {
        let db = Database::open_in_memory().unwrap();
        let history = db.chat_history();

        history.append(ChatEntry::new(ChatRole::User, "hi")).unwrap();
        history
            .append(ChatEntry::new(ChatRole::Assistant, "hello!"))
            .unwrap();

        let entries = history.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "hi");
        assert_eq!(entries[1].role, ChatRole::Assistant);
    }

    #[test]
    fn test_history_is_capped() {
        let db = Database::open_in_memory().unwrap();
        let history = db.chat_history();

        for i in 0..(MAX_CHAT_HISTORY + 7) {
            history
                .append(ChatEntry::new(ChatRole::User, format!("msg {}", i)))
                .unwrap();
        }

        let entries = history.list().unwrap();
        assert_eq!(entries.len(), MAX_CHAT_HISTORY);
        assert_eq!(entries[0].content, "msg 7");
        assert_eq!(
            entries.last().unwrap().content,
            format!("msg {}", MAX_CHAT_HISTORY + 6)
        );
    }

    #[test]
    fn test_clear() {
        let db = Database::open_in_memory().unwrap();
        let history = db.chat_history();
        history.append(ChatEntry::new(ChatRole::User, "hi")).unwrap();
        history.clear().unwrap();
        assert!(history.list().unwrap().is_empty());
    }
}
