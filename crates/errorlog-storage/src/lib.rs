//! # ErrorLog Storage
//!
//! Durable storage for the error-log service.
//!
//! ## Features
//!
//! - **Block framing**: 8-bit clean, self-delimiting blocks that can be
//!   located scanning forward or backward
//! - **BlockReader**: forward reads, plus backward reads and
//!   seek-from-end over random-access sources
//! - **RecordLog**: append-only file of framed error records with
//!   newest-first filtered history
//! - **TextLogSet**: human-readable per-severity and per-user logs with
//!   size-based rotation
//!
//! ## Example
//!
//! ```rust,ignore
//! use errorlog_core::{ErrorLogRequest, ServiceFilter, StoredRecord};
//! use errorlog_storage::{RecordLog, RecordLogConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let log = RecordLog::open(RecordLogConfig::new("/tmp/errorlog")).await.unwrap();
//!
//!     let record = StoredRecord::new(ErrorLogRequest::new("billing.Billing", "Charge"));
//!     log.append(&record).await.unwrap();
//!
//!     // Most recent matching records first
//!     let recent = log.history(&ServiceFilter::parse("billing"), 100).await.unwrap();
//!     assert_eq!(recent.len(), 1);
//! }
//! ```

pub mod append_log;
pub mod error;
pub mod streamblock;

// Re-exports
pub use append_log::{
    HistoryScan, RecordLog, RecordLogConfig, TextLog, TextLogSet, count_blocks, history_from,
    DEFAULT_TEXT_LOG_MAX_BYTES,
};
pub use error::{StorageError, StreamBlockError};
pub use streamblock::{BlockReader, BlockWriter};
