//! Append-only log storage
//!
//! - [`RecordLog`]: the framed binary log of error records, read newest
//!   first by scanning backward from the end
//! - [`TextLog`] / [`TextLogSet`]: human-readable, size-rotated companions
//!
//! ## Storage Format
//!
//! The record log is a sequence of framed blocks, each holding one
//! postcard-serialized `StoredRecord`:
//! ```text
//! [0x01][escaped record][0x00][0x01][escaped record][0x00]...
//! ```

pub mod record_log;
pub mod text_log;

pub use record_log::{
    DEFAULT_RECORD_LOG_FILE, HistoryScan, RecordLog, RecordLogConfig, count_blocks, history_from,
};
pub use text_log::{DEFAULT_TEXT_LOG_MAX_BYTES, TextLog, TextLogSet, rotated_path};
