//! Standard span names
//!
//! Shared by the service crates so that JSONL output can be queried by a
//! stable set of span names.

/// Standard span names
pub mod spans {
    pub const LOG_RECORD: &str = "log_record";
    pub const READ_LOG: &str = "read_log";
    pub const REPLAY_HISTORY: &str = "replay_history";
    pub const LIVE_TAIL: &str = "live_tail";
}
