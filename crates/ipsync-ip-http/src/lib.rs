// # HTTP IP Source
//
// Fetches the current public IPv4 address from a plain-text HTTP service
// such as https://api.ipify.org.
//
// ## Behaviour
//
// - One GET per call, no caching between cycles
// - Any 2xx response body is returned as-is; the engine trims and validates it
// - Transport failures, timeouts and non-2xx statuses are errors

use ipsync_core::ProviderRegistry;
use ipsync_core::config::{DEFAULT_IP_SOURCE_URL, IpSourceConfig};
use ipsync_core::traits::{IpSource, IpSourceFactory};
use ipsync_core::{Error, Result};

use std::time::Duration;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based IP source
#[derive(Debug)]
pub struct HttpIpSource {
    /// URL to fetch IP from
    url: String,

    /// Request timeout applied to every fetch
    timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source with the default timeout
    ///
    /// # Parameters
    ///
    /// - `url`: URL to fetch IP from (e.g., "https://api.ipify.org")
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create with a custom request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::config("HTTP IP source URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url,
            timeout,
            client,
        })
    }

    /// Point at the default service with the default timeout
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_IP_SOURCE_URL)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn fetch_current_ip(&self) -> Result<String> {
        tracing::debug!("Fetching current IP from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(format!("{} returned {}", self.url, status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response from {}: {}", self.url, e)))?;

        tracing::trace!("IP source answered {:?}", body);
        Ok(body)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

/// Factory for creating HTTP IP sources
pub struct HttpFactory;

impl IpSourceFactory for HttpFactory {
    fn create(&self, config: &IpSourceConfig) -> Result<Box<dyn IpSource>> {
        match config {
            IpSourceConfig::Http { url, timeout_secs } => Ok(Box::new(HttpIpSource::with_timeout(
                url.clone(),
                Duration::from_secs(*timeout_secs),
            )?)),
            _ => Err(Error::config("Invalid config for HTTP IP source")),
        }
    }
}

/// Register the HTTP IP source with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_ip_source("http", Box::new(HttpFactory));
}
