use iapd_core::IapdError;
use iapd_session::{Retryable, SessionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The page did not have the structure the postback protocol needs.
    #[error("unexpected page structure: {reason}")]
    Protocol { reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("HTTP failure: {0}")]
    Http(#[from] SessionError),

    /// `status` is set when the document server answered with an error status.
    #[error("download failed: {url}")]
    DownloadFailed { url: String, status: Option<u16> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }
}

impl From<IapdError> for ScanError {
    fn from(err: IapdError) -> Self {
        match err {
            IapdError::Validation(reason) => Self::InvalidArgument(reason),
            IapdError::Io(err) => Self::Io(err),
            IapdError::Config(err) => Self::InvalidArgument(err.to_string()),
        }
    }
}

impl Retryable for ScanError {
    fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http(err) => err.status_code(),
            Self::DownloadFailed { status, .. } => *status,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
