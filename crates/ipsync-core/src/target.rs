//! Record targets and the zones that own them
//!
//! A [`RecordTarget`] names one DNS A record kept in sync with the current
//! public IP. Targets are built once from configuration and never mutated.

use std::fmt;
use std::sync::Arc;

/// A provider zone: the administrative grouping of records under one domain
///
/// # Security
///
/// The Debug implementation does NOT expose the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Zone {
    /// Provider-specific zone ID
    pub id: String,
    /// Human-readable zone name (e.g. "example.com")
    pub name: String,
    /// API token scoped to this zone
    /// ⚠️ NEVER log this value
    pub token: String,
}

impl Zone {
    /// Create a new zone
    pub fn new(id: impl Into<String>, name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zone")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// One DNS A record to keep synchronized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTarget {
    /// Provider-specific record ID (used for writes)
    pub id: String,
    /// Owning zone
    pub zone: Arc<Zone>,
    /// Fully qualified record name (used for reads)
    pub name: String,
    /// Forwarded verbatim to the provider on writes
    pub proxied: bool,
}

impl RecordTarget {
    /// Create a new record target
    pub fn new(
        id: impl Into<String>,
        zone: Arc<Zone>,
        name: impl Into<String>,
        proxied: bool,
    ) -> Self {
        Self {
            id: id.into(),
            zone,
            name: name.into(),
            proxied,
        }
    }
}

impl fmt::Display for RecordTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (zone {})", self.name, self.zone.name)
    }
}
