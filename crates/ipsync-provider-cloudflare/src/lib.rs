// # Cloudflare DNS Provider
//
// Cloudflare API v4 implementation of `DnsProvider`.
//
// ## Behaviour
//
// - One HTTP request per call: a GET for reads, a PUT for writes
// - No retries, no backoff, no caching (a failed write ends the cycle)
// - Each zone carries its own API token, sent as a bearer token
// - Dry-run mode performs reads but only logs intended writes, reporting
//   them as `WriteOutcome::Simulated`
//
// ## Security
//
// - API tokens NEVER appear in logs or Debug output
// - Empty tokens are rejected before any request is made
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=A&name=...`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ipsync_core::config::{DEFAULT_CLOUDFLARE_API_BASE, ProviderConfig};
use ipsync_core::traits::{DnsProvider, DnsProviderFactory, WriteOutcome};
use ipsync_core::{Error, RecordTarget, Result, Zone};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL sent on writes; 1 means "automatic" to Cloudflare
const AUTOMATIC_TTL: u32 = 1;

/// Response envelope shared by every Cloudflare v4 endpoint
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    content: String,
}

/// Body of a record update
#[derive(Debug, Serialize, PartialEq)]
struct UpdatePayload<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: &'a str,
    content: String,
    ttl: u32,
    proxied: bool,
}

impl<'a> UpdatePayload<'a> {
    fn new(target: &'a RecordTarget, new_ip: Ipv4Addr) -> Self {
        Self {
            record_type: "A",
            name: &target.name,
            content: new_ip.to_string(),
            ttl: AUTOMATIC_TTL,
            proxied: target.proxied,
        }
    }
}

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (record lookups)
/// - Log the intended PUT payload
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// API base URL, without trailing slash
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip PUT updates
    dry_run: bool,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_base`: API root, e.g. `https://api.cloudflare.com/client/v4`
    /// - `timeout`: Per-request timeout
    /// - `dry_run`: If true, perform GET requests but skip PUT updates
    pub fn new(api_base: impl Into<String>, timeout: Duration, dry_run: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let api_base = api_base.into().trim_end_matches('/').to_string();
        if api_base.is_empty() {
            return Err(Error::config("Cloudflare API base cannot be empty"));
        }

        Ok(Self {
            api_base,
            client,
            dry_run,
        })
    }

    /// Provider against the public Cloudflare API with the default timeout
    pub fn with_defaults(dry_run: bool) -> Result<Self> {
        Self::new(DEFAULT_CLOUDFLARE_API_BASE, DEFAULT_HTTP_TIMEOUT, dry_run)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/dns_records", self.api_base, zone_id)
    }

    fn record_url(&self, zone_id: &str, record_id: &str) -> String {
        format!("{}/zones/{}/dns_records/{}", self.api_base, zone_id, record_id)
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// Look up the single A record named `record_name` in `zone`
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?type=A&name=home.example.com
    /// Authorization: Bearer <token>
    /// ```
    ///
    /// Zero or several matching records yield `Ok(None)`.
    async fn read_record(&self, zone: &Zone, record_name: &str) -> Result<Option<String>> {
        ensure_token(zone)?;

        tracing::debug!("Looking up A record {} in zone {}", record_name, zone.name);

        let response = self
            .client
            .get(self.records_url(&zone.id))
            .bearer_auth(&zone.token)
            .query(&[("type", "A"), ("name", record_name)])
            .send()
            .await
            .map_err(|e| Error::http(format!("Record lookup for {} failed: {}", record_name, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read lookup response: {}", e)))?;

        if !status.is_success() {
            return Err(status_error(status, &body, "Record lookup"));
        }

        parse_lookup(record_name, &body)
    }

    /// Overwrite the record's content with `new_ip`
    ///
    /// # API Call
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {"type": "A", "name": "...", "content": "1.2.3.4", "ttl": 1, "proxied": false}
    /// ```
    ///
    /// Succeeds only on a 2xx response whose body reports `success: true`.
    /// In dry-run mode nothing is sent and the write is `Simulated`.
    async fn write_record(&self, target: &RecordTarget, new_ip: Ipv4Addr) -> Result<WriteOutcome> {
        ensure_token(&target.zone)?;

        let url = self.record_url(&target.zone.id, &target.id);
        let payload = UpdatePayload::new(target, new_ip);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                serde_json::to_string(&payload)?
            );
            return Ok(WriteOutcome::Simulated);
        }

        tracing::info!("Updating Cloudflare DNS record: {} -> {}", target, new_ip);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&target.zone.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::http(format!("Update of {} failed: {}", target.name, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read update response: {}", e)))?;

        if !status.is_success() {
            return Err(status_error(status, &body, "Record update"));
        }

        parse_update(&target.name, &body)?;
        Ok(WriteOutcome::Applied)
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

fn ensure_token(zone: &Zone) -> Result<()> {
    if zone.token.trim().is_empty() {
        return Err(Error::auth(format!("No API token configured for zone {}", zone.name)));
    }
    Ok(())
}

/// Map a non-2xx status to an error
fn status_error(status: StatusCode, body: &str, action: &str) -> Error {
    let detail = error_summary(body).unwrap_or_else(|| status.to_string());

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{} rejected: invalid API token or insufficient permissions ({})",
            action, detail
        )),
        404 => Error::not_found(format!("{}: zone or record not found ({})", action, detail)),
        429 => Error::rate_limited(format!("{}: rate limit exceeded ({})", action, detail)),
        500..=599 => Error::provider(
            "cloudflare",
            format!("{}: server error (transient): {} - {}", action, status, detail),
        ),
        _ => Error::provider("cloudflare", format!("{} failed: {} - {}", action, status, detail)),
    }
}

/// Join the `errors` array of an API response, if the body has one
fn error_summary(body: &str) -> Option<String> {
    let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(body).ok()?;
    if envelope.errors.is_empty() {
        return None;
    }

    Some(
        envelope
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

fn parse_lookup(record_name: &str, body: &str) -> Result<Option<String>> {
    let envelope: ApiEnvelope<Vec<DnsRecord>> = serde_json::from_str(body)
        .map_err(|e| Error::dns_read(format!("Malformed lookup response for {}: {}", record_name, e)))?;

    if !envelope.success {
        return Err(Error::dns_read(format!(
            "Lookup for {} was not successful: {}",
            record_name,
            error_summary(body).unwrap_or_else(|| "no error details".to_string())
        )));
    }

    let mut records = envelope.result.unwrap_or_default();
    match records.len() {
        0 => {
            tracing::debug!("No A record named {}", record_name);
            Ok(None)
        }
        1 => Ok(records.pop().map(|record| record.content)),
        n => {
            tracing::warn!("{} A records named {}, refusing to pick one", n, record_name);
            Ok(None)
        }
    }
}

fn parse_update(record_name: &str, body: &str) -> Result<()> {
    let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(body).map_err(|e| {
        Error::dns_write(format!("Malformed update response for {}: {}", record_name, e))
    })?;

    if !envelope.success {
        return Err(Error::dns_write(format!(
            "Update of {} was not confirmed: {}",
            record_name,
            error_summary(body).unwrap_or_else(|| "no error details".to_string())
        )));
    }

    tracing::debug!("Cloudflare confirmed update of {}", record_name);
    Ok(())
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_base,
                timeout_secs,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!(
                        "Cloudflare provider running in DRY-RUN mode - no changes will be made"
                    );
                }

                Ok(Box::new(CloudflareProvider::new(
                    api_base.clone(),
                    Duration::from_secs(*timeout_secs),
                    *dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use ipsync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ipsync_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ipsync_core::ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}
