use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AmpError {
    #[error("Empty command")]
    EmptyInput,

    #[error("Could not understand the command: {0}")]
    Extraction(String),

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("No active playback device")]
    NoActiveDevice,

    #[error("Authorization error: {0}")]
    Auth(String),

    #[error("Streaming service error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid parameter: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Copyable projection of [`AmpError`] carried in results handed to the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyInput,
    Extraction,
    UnsupportedAction,
    NoActiveDevice,
    Auth,
    Upstream(u16),
    Timeout,
    Validation,
    Network,
    Internal,
}

impl AmpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AmpError::EmptyInput => ErrorKind::EmptyInput,
            AmpError::Extraction(_) => ErrorKind::Extraction,
            AmpError::UnsupportedAction(_) => ErrorKind::UnsupportedAction,
            AmpError::NoActiveDevice => ErrorKind::NoActiveDevice,
            AmpError::Auth(_) => ErrorKind::Auth,
            AmpError::Upstream { status, .. } => ErrorKind::Upstream(*status),
            AmpError::Timeout(_) => ErrorKind::Timeout,
            AmpError::Validation(_) => ErrorKind::Validation,
            AmpError::Network(_) => ErrorKind::Network,
            AmpError::Config(_) | AmpError::IoError(_) | AmpError::SerdeError(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Transient upstream failures that may be replayed once
    pub fn is_transient(&self) -> bool {
        matches!(self, AmpError::Upstream { status: 429 | 503, .. })
    }

    /// Map a transport-level reqwest failure (no response received)
    pub fn from_transport(what: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AmpError::Timeout(format!("{} did not respond in time", what))
        } else {
            AmpError::Network(format!("{}: {}", what, err))
        }
    }
}

pub type Result<T> = std::result::Result<T, AmpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_projection() {
        assert_eq!(AmpError::EmptyInput.kind(), ErrorKind::EmptyInput);
        assert_eq!(AmpError::NoActiveDevice.kind(), ErrorKind::NoActiveDevice);
        assert_eq!(
            AmpError::Upstream {
                status: 502,
                message: "bad gateway".into()
            }
            .kind(),
            ErrorKind::Upstream(502)
        );
        assert_eq!(
            AmpError::Config("missing".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_transient_statuses() {
        let upstream = |status| AmpError::Upstream {
            status,
            message: String::new(),
        };
        assert!(upstream(429).is_transient());
        assert!(upstream(503).is_transient());
        assert!(!upstream(500).is_transient());
        assert!(!upstream(404).is_transient());
        assert!(!AmpError::Timeout("x".into()).is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = AmpError::Upstream {
            status: 403,
            message: "Premium required".into(),
        };
        assert_eq!(
            err.to_string(),
            "Streaming service error (403): Premium required"
        );
    }
}
