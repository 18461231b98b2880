//! SQLite-backed local persisted state for Youthnet

mod chat_history;
mod local;
mod migrations;
mod session_cache;

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;

pub use chat_history::{ChatEntry, ChatHistoryStore, ChatRole, CHAT_HISTORY_KEY, MAX_CHAT_HISTORY};
pub use local::LocalStore;
pub use session_cache::{SessionCache, RETURN_PATH_KEY, SESSION_KEY};

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Get raw key/value store
    pub fn local(&self) -> LocalStore<'_> {
        LocalStore::new(&self.conn)
    }

    /// Get session cache
    pub fn session_cache(&self) -> SessionCache<'_> {
        SessionCache::new(&self.conn)
    }

    /// Get chat history store for the chat widget
    pub fn chat_history(&self) -> ChatHistoryStore<'_> {
        ChatHistoryStore::new(&self.conn)
    }
}
