//! Seams to the collaborators of the error-log service
//!
//! ## Key Traits
//!
//! - [`IdentityResolver`]: user id to display identity (best effort)
//! - [`MetricsSink`]: counters keyed by status code, service and method
//! - [`TailSink`]: outbound stream of a tail query

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, TransportError};
use crate::identity::UserInfo;
use crate::record::{ErrorLogRequest, StoredRecord};

/// Resolves user ids to display identities
///
/// Failures are recovered by the caller: the record is persisted with an
/// empty email.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Look up a user by id
    async fn user_by_id(&self, user_id: &str) -> Result<UserInfo, IdentityError>;
}

/// Labels of the received-errors counter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricLabels {
    /// Raw status code, rendered as a decimal string
    pub code: String,
    pub service: String,
    pub method: String,
}

impl MetricLabels {
    pub fn for_request(request: &ErrorLogRequest) -> Self {
        Self {
            code: request.error_code.to_string(),
            service: request.service_name.clone(),
            method: request.method_name.clone(),
        }
    }
}

impl fmt::Display for MetricLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.service, self.method, self.code)
    }
}

/// Counts received error records
pub trait MetricsSink: Send + Sync {
    /// Increment the counter for `labels`
    fn increment(&self, labels: &MetricLabels);
}

/// Outbound stream of a tail query
///
/// [`TransportError::ConnectionClosed`] means the caller went away and
/// ends the query normally.
#[async_trait]
pub trait TailSink: Send {
    /// Send one matching record to the caller
    async fn send(&mut self, record: &StoredRecord) -> Result<(), TransportError>;
}
