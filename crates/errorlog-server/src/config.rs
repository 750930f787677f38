//! Configuration for the error-log service

use std::path::PathBuf;

use errorlog_core::DEFAULT_MAILBOX_CAPACITY;
use errorlog_storage::{DEFAULT_TEXT_LOG_MAX_BYTES, RecordLogConfig};
use serde::{Deserialize, Serialize};

/// Default bound on the history replayed by a tail query
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Configuration for an [`ErrorLogService`](crate::ErrorLogService)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Directory holding the record log and the text logs
    pub log_dir: PathBuf,
    /// Maximum number of historical records replayed per tail query
    pub max_history: usize,
    /// Pending live records buffered per tail query
    pub mailbox_capacity: usize,
    /// Size at which a text log is rotated
    pub text_log_max_bytes: u64,
    /// Whether each record append is synced to disk
    pub sync_on_write: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("/var/log/errorlogger"),
            max_history: DEFAULT_MAX_HISTORY,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            text_log_max_bytes: DEFAULT_TEXT_LOG_MAX_BYTES,
            sync_on_write: true,
        }
    }
}

impl ServerConfig {
    /// Create a configuration with a custom log directory
    pub fn with_log_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Default::default()
        }
    }

    /// Set the history bound
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }

    /// Set the per-query mailbox capacity
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Set the text log rotation size
    pub fn with_text_log_max_bytes(mut self, bytes: u64) -> Self {
        self.text_log_max_bytes = bytes;
        self
    }

    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Configuration of the framed record log
    pub fn record_log(&self) -> RecordLogConfig {
        RecordLogConfig::new(&self.log_dir).with_sync_on_write(self.sync_on_write)
    }
}
