//! Transport error types.

use thiserror::Error;

/// Why a delivery attempt failed.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Temporary failure; the message can be tried again later.
    #[error("Transient delivery failure: {0}")]
    Transient(String),

    /// The receiving side refused the message for good.
    #[error("Message rejected: {0}")]
    Rejected(String),

    /// The message itself cannot be delivered by any transport.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TransportError {
    /// Whether retrying the same message can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::InvalidMessage(_))
    }
}

/// Result type alias using TransportError.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanence() {
        assert!(TransportError::Rejected("550".into()).is_permanent());
        assert!(TransportError::InvalidMessage("no recipients".into()).is_permanent());
        assert!(!TransportError::Transient("timeout".into()).is_permanent());
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!TransportError::from(io).is_permanent());
    }
}
