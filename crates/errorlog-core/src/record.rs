//! Error records
//!
//! [`ErrorLogRequest`] is what a producer submits. [`StoredRecord`] wraps it
//! with the authenticated caller and is the unit persisted in the framed
//! log. [`LogEvent`] is what live subscribers receive.

use std::fmt::{self, Display};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::filter::ServiceFilter;
use crate::identity::{CallingService, UserInfo};

/// RPC status code carried by an error record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum StatusCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl StatusCode {
    /// Map a raw code to a status; unrecognised values become `Unknown`
    pub fn from_u32(code: u32) -> Self {
        match code {
            0 => StatusCode::Ok,
            1 => StatusCode::Cancelled,
            3 => StatusCode::InvalidArgument,
            4 => StatusCode::DeadlineExceeded,
            5 => StatusCode::NotFound,
            6 => StatusCode::AlreadyExists,
            7 => StatusCode::PermissionDenied,
            8 => StatusCode::ResourceExhausted,
            9 => StatusCode::FailedPrecondition,
            10 => StatusCode::Aborted,
            11 => StatusCode::OutOfRange,
            12 => StatusCode::Unimplemented,
            13 => StatusCode::Internal,
            14 => StatusCode::Unavailable,
            15 => StatusCode::DataLoss,
            16 => StatusCode::Unauthenticated,
            _ => StatusCode::Unknown,
        }
    }

    /// The raw numeric code
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Whether this code is routine noise rather than a real failure
    ///
    /// Routine codes are kept out of the filtered-severity text log.
    pub fn is_routine(self) -> bool {
        matches!(
            self,
            StatusCode::NotFound | StatusCode::PermissionDenied | StatusCode::Unauthenticated
        )
    }

    fn name(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Cancelled => "Canceled",
            StatusCode::Unknown => "Unknown",
            StatusCode::InvalidArgument => "InvalidArgument",
            StatusCode::DeadlineExceeded => "DeadlineExceeded",
            StatusCode::NotFound => "NotFound",
            StatusCode::AlreadyExists => "AlreadyExists",
            StatusCode::PermissionDenied => "PermissionDenied",
            StatusCode::ResourceExhausted => "ResourceExhausted",
            StatusCode::FailedPrecondition => "FailedPrecondition",
            StatusCode::Aborted => "Aborted",
            StatusCode::OutOfRange => "OutOfRange",
            StatusCode::Unimplemented => "Unimplemented",
            StatusCode::Internal => "Internal",
            StatusCode::Unavailable => "Unavailable",
            StatusCode::DataLoss => "DataLoss",
            StatusCode::Unauthenticated => "Unauthenticated",
        }
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A free-form message attached to an error record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub message: String,
    /// Call trace lines collected where the error was raised
    pub call_traces: Vec<String>,
}

impl LogMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            call_traces: Vec::new(),
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.call_traces.push(trace.into());
        self
    }
}

/// An error record as submitted by a producer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogRequest {
    /// User on whose behalf the call was made, empty if none
    pub user_id: String,
    pub service_name: String,
    pub method_name: String,
    /// Raw RPC status code, see [`StatusCode`]
    pub error_code: u32,
    pub error_message: String,
    pub log_message: String,
    /// Unix seconds
    pub timestamp: u32,
    pub messages: Vec<LogMessage>,
    pub calling_service: Option<CallingService>,
}

impl ErrorLogRequest {
    /// Create a request for a failing method
    pub fn new(service_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            method_name: method_name.into(),
            timestamp: chrono::Utc::now().timestamp() as u32,
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_code(mut self, code: StatusCode) -> Self {
        self.error_code = code.as_u32();
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    pub fn with_log_message(mut self, message: impl Into<String>) -> Self {
        self.log_message = message.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_message(mut self, message: LogMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_calling_service(mut self, service: CallingService) -> Self {
        self.calling_service = Some(service);
        self
    }

    /// The status code as a typed value
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u32(self.error_code)
    }
}

/// The unit persisted in the framed log and broadcast to subscribers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// The submitted record
    pub request: ErrorLogRequest,
    /// Authenticated user of the submitting call
    pub user: Option<UserInfo>,
    /// Authenticated service of the submitting call
    pub service: Option<CallingService>,
}

impl StoredRecord {
    pub fn new(request: ErrorLogRequest) -> Self {
        Self {
            request,
            user: None,
            service: None,
        }
    }

    pub fn with_user(mut self, user: UserInfo) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_service(mut self, service: CallingService) -> Self {
        self.service = Some(service);
        self
    }

    /// Serialize to the bytes stored inside one block
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        postcard::to_allocvec(self).map_err(|e| RecordError::Encode(e.to_string()))
    }

    /// Deserialize from the bytes of one block
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        postcard::from_bytes(bytes).map_err(|e| RecordError::Decode(e.to_string()))
    }
}

/// A tail query as submitted by a reader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadLogRequest {
    /// Service name fragments to match, empty for all
    pub services: Vec<String>,
}

impl ReadLogRequest {
    /// Query matching every service
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_services<S: Into<String>>(services: impl IntoIterator<Item = S>) -> Self {
        Self {
            services: services.into_iter().map(Into::into).collect(),
        }
    }

    /// The filter applied to both phases of the query
    pub fn filter(&self) -> ServiceFilter {
        ServiceFilter::new(&self.services)
    }
}

/// A record announced to live subscribers after it was persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Offset of the record's block in the framed log
    pub offset: u64,
    pub record: Arc<StoredRecord>,
}

impl LogEvent {
    pub fn new(offset: u64, record: StoredRecord) -> Self {
        Self {
            offset,
            record: Arc::new(record),
        }
    }
}
