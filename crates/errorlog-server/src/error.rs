//! Error types for the error-log service

use errorlog_core::TransportError;
use errorlog_storage::StorageError;
use thiserror::Error;

/// Errors that can occur in the error-log service
#[derive(Debug, Error)]
pub enum ServerError {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The caller's stream failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Io(e.to_string())
    }
}

/// Result type alias for service operations
pub type ServerResult<T> = Result<T, ServerError>;
