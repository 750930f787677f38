//! Error types for errorlog-storage
//!
//! [`StreamBlockError`] is returned by the block reader and writer.
//! [`StorageError`] is returned by the record and text logs.

use errorlog_core::RecordError;
use thiserror::Error;

/// Errors from reading or writing framed blocks
#[derive(Debug, Error)]
pub enum StreamBlockError {
    /// The source ended before a complete block was found
    ///
    /// Also returned by backward reads that reach the beginning of storage.
    #[error("End of stream")]
    EndOfStream,

    /// A seek was requested on a forward-only reader
    #[error("Reader is not seekable")]
    NotSeekable,

    /// I/O error on the underlying source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamBlockError {
    /// Whether this is the normal end-of-stream condition
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            StreamBlockError::EndOfStream => true,
            StreamBlockError::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            StreamBlockError::NotSeekable => false,
        }
    }
}

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Error while framing or scanning blocks
    #[error("Block error: {0}")]
    StreamBlock(#[from] StreamBlockError),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The log has been closed
    #[error("Log closed: {0}")]
    Closed(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<RecordError> for StorageError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Encode(msg) => StorageError::Serialization(msg),
            RecordError::Decode(msg) => StorageError::Deserialization(msg),
        }
    }
}

/// Convert from postcard Error to StorageError
impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}

impl StorageError {
    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }
}
