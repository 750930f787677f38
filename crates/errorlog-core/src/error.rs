//! Error types for the error-log service

use thiserror::Error;

/// Errors raised while resolving a caller's identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Identity service unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the outbound side of a tail query
///
/// [`TransportError::ConnectionClosed`] doubles as the end-of-stream signal:
/// a subscriber returning it stops normally.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),
}

impl TransportError {
    /// Whether this error is the normal end-of-stream signal
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, TransportError::ConnectionClosed)
    }
}

/// Errors encoding or decoding a stored record
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Failed to encode record: {0}")]
    Encode(String),

    #[error("Failed to decode record: {0}")]
    Decode(String),
}
