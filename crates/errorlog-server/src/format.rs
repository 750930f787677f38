//! Human-readable renderings of error records
//!
//! [`format_entry`] produces the lines written to the text logs;
//! [`format_listing`] the fixed-width columns shown by tail clients.

use std::fmt::Write;

use chrono::DateTime;
use errorlog_core::{ErrorLogRequest, StatusCode, StoredRecord};

/// Timestamp format used in text log entries (UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Width of the caller column in a listing
pub const CALLER_WIDTH: usize = 20;
/// Width of the user id column in a listing
pub const USER_ID_WIDTH: usize = 6;
/// Width of the `service/method` column in a listing
pub const ENDPOINT_WIDTH: usize = 50;

/// Render unix seconds as a UTC date and time
pub fn format_timestamp(timestamp: u32) -> String {
    match DateTime::from_timestamp(i64::from(timestamp), 0) {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => timestamp.to_string(),
    }
}

/// Name of a raw status code; codes outside the known set render as `Code(N)`
pub fn status_name(code: u32) -> String {
    let status = StatusCode::from_u32(code);
    if status.as_u32() == code {
        status.to_string()
    } else {
        format!("Code({})", code)
    }
}

/// Format a submitted record for the text logs
///
/// `email` is the resolved email of `request.user_id`, empty if unknown.
///
/// ```text
/// 2024-01-02 03:04:05: #00042(a@example.com) [7(svc@example.com)->auth.Auth.Login] NotFound no such user
///    first attached message
/// ```
pub fn format_entry(request: &ErrorLogRequest, email: &str) -> String {
    let calling = request
        .calling_service
        .as_ref()
        .map_or_else(|| "unavailable".to_string(), |s| s.to_string());

    let mut out = format!(
        "{}: #{:0>5}({}) [{}->{}.{}] {} {}\n",
        format_timestamp(request.timestamp),
        request.user_id,
        email,
        calling,
        request.service_name,
        request.method_name,
        status_name(request.error_code),
        request.log_message,
    );
    for m in &request.messages {
        let _ = writeln!(out, "   {}", m.message);
    }
    out
}

/// Format a stored record as one listing row plus its call traces
pub fn format_listing(record: &StoredRecord) -> String {
    let req = &record.request;
    let caller = record
        .user
        .as_ref()
        .map(|u| u.to_string())
        .unwrap_or_default();

    let mut out = format!(
        "{} {} {} {} {}\n",
        fit(&caller, CALLER_WIDTH),
        fit(&req.user_id, USER_ID_WIDTH),
        fit(&format!("{}/{}", req.service_name, req.method_name), ENDPOINT_WIDTH),
        req.error_code,
        req.error_message,
    );
    for trace in req.messages.iter().flat_map(|m| &m.call_traces) {
        let _ = writeln!(out, "      -> {}", trace);
    }
    out
}

/// Pad `s` with spaces to `width` chars, or cut it and end with `...`
pub fn fit(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}
