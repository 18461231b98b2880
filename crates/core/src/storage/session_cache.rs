//! Cached session blob and post-login return path

use rusqlite::Connection;
use tracing::{debug, instrument, warn};

use super::local::LocalStore;
use crate::error::Result;
use crate::models::{CachedSession, Session};

/// Key of the cached session blob
pub const SESSION_KEY: &str = "youthnet.auth.session";

/// Key of the "return here after next login" marker
pub const RETURN_PATH_KEY: &str = "youthnet.auth.return_path";

/// Session cache over the local store
pub struct SessionCache<'a> {
    store: LocalStore<'a>,
}

impl<'a> SessionCache<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            store: LocalStore::new(conn),
        }
    }

    /// Load the cached blob. A blob that no longer parses is discarded and
    /// reported as absent.
    #[instrument(skip(self))]
    pub fn load(&self) -> Result<Option<CachedSession>> {
        match self.store.get_json::<CachedSession>(SESSION_KEY) {
            Ok(cached) => Ok(cached),
            Err(crate::Error::Serialization(e)) => {
                warn!(error = %e, "Discarding unreadable cached session");
                self.store.remove(SESSION_KEY)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Cache a session, stamping the cache time
    #[instrument(skip(self, session), fields(user_id = %session.user.id))]
    pub fn save(&self, session: &Session) -> Result<()> {
        self.store
            .set_json(SESSION_KEY, &CachedSession::from_session(session))
    }

    /// Drop the cached session
    pub fn clear(&self) -> Result<()> {
        debug!("Clearing cached session");
        self.store.remove(SESSION_KEY)
    }

    /// Remember where to send the user after the next login
    pub fn set_return_path(&self, path: &str) -> Result<()> {
        self.store.set(RETURN_PATH_KEY, path)
    }

    /// Consume the return path marker
    pub fn take_return_path(&self) -> Result<Option<String>> {
        let path = self.store.get(RETURN_PATH_KEY)?;
        if path.is_some() {
            self.store.remove(RETURN_PATH_KEY)?;
        }
        Ok(path)
    }
}
