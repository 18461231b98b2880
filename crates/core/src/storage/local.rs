//! Key/value persistence for client-side state

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

use crate::error::Result;

/// Key/value store backed by the `local_store` table
pub struct LocalStore<'a> {
    conn: &'a Connection,
}

impl<'a> LocalStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Read the raw value stored under a key
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM local_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Store a raw value, replacing any previous one
    #[instrument(skip(self, value))]
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO local_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Remove a key. Missing keys are not an error.
    #[instrument(skip(self))]
    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM local_store WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Read and deserialize a JSON value
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store a JSON value
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }
}
