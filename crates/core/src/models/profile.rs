//! Profile and role models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Network roles in priority order (highest to lowest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    /// Staff with access to the admin panel
    Admin = 2,
    /// Regular network member. Unknown role strings land here.
    #[serde(other)]
    Member = 1,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Member => "Member",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A member profile as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Least-privilege stand-in used when the real profile cannot be loaded
    pub fn fallback(id: Uuid) -> Self {
        Self {
            id,
            full_name: None,
            role: Role::Member,
            avatar_url: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or("Unknown")
    }
}
