//! Best-effort audit trail writer

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;
use youthnet_core::{ActionKind, DataProvider, NewAdminAction};

/// Writes `admin_actions` records without ever failing the caller
pub struct AuditTrail {
    data: Arc<dyn DataProvider>,
    timeout: Duration,
}

impl AuditTrail {
    pub fn new(data: Arc<dyn DataProvider>, timeout: Duration) -> Self {
        Self { data, timeout }
    }

    /// Record an action. Returns whether the write landed; failures and
    /// timeouts are only logged.
    pub async fn record(
        &self,
        actor: Option<Uuid>,
        kind: ActionKind,
        details: serde_json::Value,
    ) -> bool {
        let action = NewAdminAction::new(actor, kind, details);
        match tokio::time::timeout(self.timeout, self.data.insert_admin_action(&action)).await {
            Ok(Ok(())) => {
                debug!(kind = %kind, "Audit record written");
                true
            }
            Ok(Err(e)) => {
                warn!(kind = %kind, error = %e, "Failed to write audit record");
                false
            }
            Err(_) => {
                warn!(kind = %kind, timeout = ?self.timeout, "Audit write timed out");
                false
            }
        }
    }
}
