//! Configuration types for ipsync
//!
//! The whole configuration is one JSON document:
//!
//! ```json
//! {
//!   "zones": [
//!     { "id": "023e105f4ecef8ad9ca31a8372d0c353", "name": "example.com", "token": "..." }
//!   ],
//!   "records": [
//!     { "id": "372e67954025e0ba6aaa6d586b9e0b59", "zone_id": "023e105f4ecef8ad9ca31a8372d0c353",
//!       "name": "home.example.com", "proxied": false }
//!   ],
//!   "ip_source": { "type": "http", "url": "https://api.ipify.org" },
//!   "provider": { "type": "cloudflare" },
//!   "state_store": { "type": "file", "path": "/var/lib/ipsync/last-ip.txt" },
//!   "schedule": { "interval_minutes": 5 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::target::{RecordTarget, Zone};

/// Default public IP service
pub const DEFAULT_IP_SOURCE_URL: &str = "https://api.ipify.org";

/// Cloudflare API base URL
pub const DEFAULT_CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default location of the last-known-IP file
pub const DEFAULT_LAST_IP_PATH: &str = "./ipsync-last-ip.txt";

/// Main ipsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Zones owning the managed records
    pub zones: Vec<ZoneConfig>,

    /// Records to keep in sync, in processing order
    pub records: Vec<RecordConfig>,

    /// IP source configuration
    #[serde(default)]
    pub ip_source: IpSourceConfig,

    /// DNS provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Last-known-IP store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Scheduling between cycles
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional log file, rotated daily, written in addition to stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl SyncConfig {
    /// Create an empty configuration with defaults
    pub fn new() -> Self {
        Self {
            zones: Vec::new(),
            records: Vec::new(),
            ip_source: IpSourceConfig::default(),
            provider: ProviderConfig::default(),
            state_store: StateStoreConfig::default(),
            schedule: ScheduleConfig::default(),
            log_level: default_log_level(),
            log_file: None,
        }
    }

    /// Parse a configuration from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_json(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.records.is_empty() {
            return Err(Error::config("No records configured"));
        }

        let mut zone_ids = HashSet::new();
        for zone in &self.zones {
            zone.validate()?;
            if !zone_ids.insert(zone.id.as_str()) {
                return Err(Error::config(format!("Duplicate zone id: {}", zone.id)));
            }
        }

        let mut record_ids = HashSet::new();
        let mut record_names = HashSet::new();
        for record in &self.records {
            record.validate()?;
            if !zone_ids.contains(record.zone_id.as_str()) {
                return Err(Error::config(format!(
                    "Record {} references unknown zone {}",
                    record.name, record.zone_id
                )));
            }
            if !record_ids.insert(record.id.as_str()) {
                return Err(Error::config(format!("Duplicate record id: {}", record.id)));
            }
            if !record_names.insert((record.zone_id.as_str(), record.name.to_ascii_lowercase())) {
                return Err(Error::config(format!(
                    "Record {} is configured twice in zone {}",
                    record.name, record.zone_id
                )));
            }
        }

        self.ip_source.validate()?;
        self.provider.validate()?;
        self.state_store.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(Error::config(format!(
                    "Log level '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                    self.log_level
                )));
            }
        }

        if self
            .log_file
            .as_deref()
            .is_some_and(|path| path.trim().is_empty())
        {
            return Err(Error::config("log_file cannot be empty when set"));
        }

        Ok(())
    }

    /// Build the ordered record targets
    ///
    /// Records keep their configured order. Each zone is shared between its
    /// records.
    pub fn resolve_targets(&self) -> Result<Vec<RecordTarget>> {
        let zones: Vec<Arc<Zone>> = self
            .zones
            .iter()
            .map(|z| Arc::new(Zone::new(&z.id, &z.name, &z.token)))
            .collect();

        self.records
            .iter()
            .map(|record| {
                let zone = zones
                    .iter()
                    .find(|z| z.id == record.zone_id)
                    .ok_or_else(|| {
                        Error::config(format!(
                            "Record {} references unknown zone {}",
                            record.name, record.zone_id
                        ))
                    })?;

                Ok(RecordTarget::new(
                    &record.id,
                    Arc::clone(zone),
                    &record.name,
                    record.proxied,
                ))
            })
            .collect()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Zone configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Provider zone ID
    pub id: String,
    /// Zone display name
    pub name: String,
    /// API token for this zone
    pub token: String,
}

impl ZoneConfig {
    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::config("Zone id cannot be empty"));
        }
        if self.token.trim().is_empty() {
            return Err(Error::config(format!(
                "Zone {} has an empty API token",
                self.id
            )));
        }
        Ok(())
    }
}

// Custom Debug implementation that hides the token
impl std::fmt::Debug for ZoneConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// DNS record configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Provider record ID
    pub id: String,

    /// ID of the owning zone
    pub zone_id: String,

    /// DNS record name (e.g., "home.example.com")
    pub name: String,

    /// Provider proxy toggle, forwarded verbatim on writes
    #[serde(default)]
    pub proxied: bool,
}

impl RecordConfig {
    /// Create a new record configuration
    pub fn new(
        id: impl Into<String>,
        zone_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            zone_id: zone_id.into(),
            name: name.into(),
            proxied: false,
        }
    }

    /// Set the proxied flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::config(format!(
                "Record {} has an empty record id",
                self.name
            )));
        }
        validate_domain_name(&self.name)
    }
}

/// IP source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpSourceConfig {
    /// Plain-text HTTP "what is my IP" service
    Http {
        /// URL to fetch the IP from
        #[serde(default = "default_ip_source_url")]
        url: String,
        /// Request timeout in seconds
        #[serde(default = "default_ip_timeout_secs")]
        timeout_secs: u64,
    },

    /// Custom IP source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl IpSourceConfig {
    /// Validate the IP source configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            IpSourceConfig::Http { url, timeout_secs } => {
                if url.is_empty() {
                    return Err(Error::config("HTTP IP source URL cannot be empty"));
                }
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(Error::config(format!(
                        "HTTP IP source URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                validate_timeout("IP source", *timeout_secs)
            }
            IpSourceConfig::Custom { factory, config } => {
                validate_custom("IP source", factory, config)
            }
        }
    }

    /// Get the IP source type name
    pub fn type_name(&self) -> &str {
        match self {
            IpSourceConfig::Http { .. } => "http",
            IpSourceConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for IpSourceConfig {
    fn default() -> Self {
        IpSourceConfig::Http {
            url: default_ip_source_url(),
            timeout_secs: default_ip_timeout_secs(),
        }
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// API base URL (overridable for testing)
        #[serde(default = "default_cloudflare_api_base")]
        api_base: String,
        /// Request timeout in seconds
        #[serde(default = "default_provider_timeout_secs")]
        timeout_secs: u64,
        /// Perform reads but only log intended writes
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            ProviderConfig::Cloudflare {
                api_base,
                timeout_secs,
                ..
            } => {
                if !api_base.starts_with("https://") && !api_base.starts_with("http://") {
                    return Err(Error::config(format!(
                        "Cloudflare API base must use HTTP or HTTPS scheme. Got: {}",
                        api_base
                    )));
                }
                validate_timeout("Provider", *timeout_secs)
            }
            ProviderConfig::Custom { factory, config } => {
                validate_custom("provider", factory, config)
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }

    /// Force dry-run mode on providers that support it
    pub fn set_dry_run(&mut self, enabled: bool) {
        if let ProviderConfig::Cloudflare { dry_run, .. } = self {
            *dry_run = enabled;
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Cloudflare {
            api_base: default_cloudflare_api_base(),
            timeout_secs: default_provider_timeout_secs(),
            dry_run: false,
        }
    }
}

/// Last-known-IP store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// Plain text file
    File {
        /// Path to the last-known-IP file
        #[serde(default = "default_last_ip_path")]
        path: String,
    },

    /// In-memory slot (not persistent)
    Memory,
}

impl StateStoreConfig {
    /// Validate the state store configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            StateStoreConfig::File { path } if path.is_empty() => {
                Err(Error::config("State store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        StateStoreConfig::File {
            path: default_last_ip_path(),
        }
    }
}

/// Scheduling configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes between cycles; 0 runs a single cycle and exits
    #[serde(default)]
    pub interval_minutes: u64,
}

impl ScheduleConfig {
    /// Interval between cycles (`Duration::ZERO` means single-shot)
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

/// Validate that a string is a valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        // Wildcard and underscore labels are legal A record owners
        if label != "*"
            && !label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn validate_timeout(what: &str, timeout_secs: u64) -> Result<()> {
    if !(1..=300).contains(&timeout_secs) {
        return Err(Error::config(format!(
            "{} timeout must be between 1 and 300 seconds. Got: {}",
            what, timeout_secs
        )));
    }
    Ok(())
}

fn validate_custom(what: &str, factory: &str, config: &serde_json::Value) -> Result<()> {
    if factory.is_empty() {
        return Err(Error::config(format!(
            "Custom {} factory cannot be empty",
            what
        )));
    }
    if config.is_null() {
        return Err(Error::config(format!(
            "Custom {} config cannot be null",
            what
        )));
    }
    Ok(())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ip_source_url() -> String {
    DEFAULT_IP_SOURCE_URL.to_string()
}

fn default_ip_timeout_secs() -> u64 {
    10
}

fn default_cloudflare_api_base() -> String {
    DEFAULT_CLOUDFLARE_API_BASE.to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_last_ip_path() -> String {
    DEFAULT_LAST_IP_PATH.to_string()
}
