//! Session lifecycle: restore, sign-in, sign-out, profile refresh and the
//! security audit trail

mod audit;
mod manager;

pub use audit::AuditTrail;
pub use manager::{SessionManager, SessionTimeouts};
