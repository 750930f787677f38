//! Caller identities attached to error records
//!
//! Two kinds of identity travel with a record:
//!
//! - [`UserInfo`]: the end user on whose behalf the failing call was made,
//!   resolved from a user id by an [`IdentityResolver`](crate::IdentityResolver)
//! - [`CallingService`]: the service that issued the failing call

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Display identity of a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserInfo {
    /// Opaque user id
    pub id: String,
    /// Contact email, empty when unknown
    pub email: String,
    /// Short handle used for per-user log file names
    pub abbrev: String,
}

impl UserInfo {
    /// Create a user with only an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Set the abbreviation
    pub fn with_abbrev(mut self, abbrev: impl Into<String>) -> Self {
        self.abbrev = abbrev.into();
        self
    }

    /// Name used for the per-user log file: the abbreviation, or the id if none is set
    pub fn file_stem(&self) -> &str {
        if self.abbrev.is_empty() {
            &self.id
        } else {
            &self.abbrev
        }
    }
}

impl Display for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.email.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{}({})", self.id, self.email)
        }
    }
}

/// The service that made a failing call
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallingService {
    /// Service id
    pub id: String,
    /// Service account email
    pub email: String,
}

impl CallingService {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

impl Display for CallingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.id, self.email)
    }
}
