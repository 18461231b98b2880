//! Navigation seam between the session lifecycle and the hosting UI

use std::sync::Mutex;

use tracing::info;

/// Path of the admin login screen
pub const LOGIN_PATH: &str = "/admin/login";

/// Where the UI currently is, and how to send it somewhere else
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn redirect(&self, path: &str);
}

/// Headless navigator that tracks the path and logs redirects
pub struct ConsoleNavigator {
    path: Mutex<String>,
}

impl ConsoleNavigator {
    pub fn new(start: &str) -> Self {
        Self {
            path: Mutex::new(start.to_string()),
        }
    }
}

impl Navigator for ConsoleNavigator {
    fn current_path(&self) -> String {
        self.path
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn redirect(&self, path: &str) {
        info!(to = path, "Redirecting");
        *self.path.lock().unwrap_or_else(|e| e.into_inner()) = path.to_string();
    }
}
