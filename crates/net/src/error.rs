//! Backend client error types

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Backend client errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl From<Error> for youthnet_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Status {
                status: 400 | 401 | 403,
                message,
            } => youthnet_core::Error::Authentication(message),
            Error::NotAuthenticated => youthnet_core::Error::Authentication(e.to_string()),
            Error::InvalidToken(_) => youthnet_core::Error::Authentication(e.to_string()),
            Error::Http(ref inner) if inner.is_timeout() => {
                youthnet_core::Error::Timeout(e.to_string())
            }
            other => youthnet_core::Error::Provider(other.to_string()),
        }
    }
}
