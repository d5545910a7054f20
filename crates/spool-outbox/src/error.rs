//! Spool error types.

use thiserror::Error;

/// Spool error type.
#[derive(Error, Debug)]
pub enum SpoolError {
    /// The backing store failed; fatal for a flush pass.
    #[error("Database error: {0}")]
    Database(#[from] spool_database::DatabaseError),

    /// Delivery failed outside a flush (direct mailer, invalid message).
    #[error("Transport error: {0}")]
    Transport(#[from] mail_transport::TransportError),

    /// Message ID already present in the spool.
    #[error("Duplicate message id: {0}")]
    Duplicate(String),
}

/// Result type alias using SpoolError.
pub type SpoolResult<T> = Result<T, SpoolError>;
