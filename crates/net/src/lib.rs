//! Youthnet Network Library
//!
//! HTTP client for the hosted backend that stores all Youthnet data.
//!
//! # Architecture
//!
//! - **Auth**: password sign-in, token refresh and sign-out against `/auth/v1`,
//!   with auth state changes broadcast to subscribers
//! - **Data**: table reads and RPC calls against `/rest/v1`
//! - **Query**: a small builder for the REST filter syntax
//!
//! # Usage
//!
//! ```ignore
//! let client = Arc::new(BackendClient::new(BackendConfig { url, anon_key }));
//! let session = client.sign_in_with_password("admin@youthnet.org", "secret").await?;
//! let refresher = client.clone().spawn_auto_refresh(cancel.clone());
//! let profile = client.fetch_profile(session.user.id).await?;
//! ```

pub mod client;
pub mod error;
pub mod query;
pub mod token;

pub use client::{BackendClient, BackendConfig};
pub use error::{Error, Result};
pub use query::Select;
