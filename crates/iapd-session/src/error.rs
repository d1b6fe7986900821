use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures of a single HTTP round trip.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl SessionError {
    /// Status code of the response, when the server answered at all.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
