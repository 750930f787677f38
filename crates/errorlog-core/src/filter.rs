//! Filter predicate for tail queries
//!
//! A [`ServiceFilter`] is stateless and is applied unchanged to both the
//! historical and the live half of a tail query.

use crate::record::StoredRecord;

/// Matches records whose service name contains any of a set of substrings
///
/// Matching is case-insensitive. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceFilter {
    /// Lower-cased service name fragments
    services: Vec<String>,
}

impl ServiceFilter {
    /// Filter matching everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching any of the given service name fragments
    pub fn new<S: AsRef<str>>(services: impl IntoIterator<Item = S>) -> Self {
        Self {
            services: services
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Parse a comma separated list such as `"billing, auth"`
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// The normalised fragments
    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Whether this filter accepts everything
    pub fn is_match_all(&self) -> bool {
        self.services.is_empty()
    }

    /// Test a decoded record
    pub fn matches(&self, record: &StoredRecord) -> bool {
        if self.services.is_empty() {
            return true;
        }
        let service = record.request.service_name.to_lowercase();
        self.services.iter().any(|s| service.contains(s.as_str()))
    }

    /// Decode a raw block and test it
    ///
    /// Returns the record if it decodes and matches. Blocks that do not
    /// decode never match.
    pub fn matches_block(&self, block: &[u8]) -> Option<StoredRecord> {
        let record = StoredRecord::from_bytes(block).ok()?;
        self.matches(&record).then_some(record)
    }
}
