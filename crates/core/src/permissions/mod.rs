//! Permission system for admin panel operations

use crate::models::Role;

/// Capabilities gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    AccessAdminPanel,
    ViewNotifications,
}

/// Permission matrix for network roles
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Check if a role holds a capability
    pub fn can_perform(role: Role, capability: Capability) -> bool {
        match capability {
            Capability::AccessAdminPanel | Capability::ViewNotifications => role >= Role::Admin,
        }
    }

    /// Is this role allowed into the admin panel at all?
    pub fn is_admin(role: Role) -> bool {
        Self::can_perform(role, Capability::AccessAdminPanel)
    }
}
