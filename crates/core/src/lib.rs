//! Youthnet Core Library
//!
//! Domain models, role-based authorization, backend capability traits and
//! local persisted state for the Youthnet admin panel.

pub mod error;
pub mod models;
pub mod permissions;
pub mod provider;
pub mod storage;

pub use error::{Error, Result};
pub use models::*;
pub use permissions::*;
pub use provider::{AuthChange, AuthEvent, AuthProvider, DataProvider};
pub use storage::{ChatEntry, ChatHistoryStore, ChatRole, Database, LocalStore, SessionCache};
