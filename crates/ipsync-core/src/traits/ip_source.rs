// # IP Source Trait
//
// Defines the interface for discovering the caller's current public IPv4
// address.
//
// ## Implementations
//
// - HTTP "what is my IP" services: `ipsync-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ipsync_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     let raw = source.fetch_current_ip().await?;
//     println!("current IP: {}", raw.trim());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for IP source implementations
///
/// # Contract
///
/// - Returns the address as the service reported it, as text. The
///   Reconciler trims whitespace and validates it as IPv4.
/// - Unreachable services and non-success responses are errors. The
///   Reconciler treats any error as fatal for the current cycle.
///
/// ## Forbidden Capabilities
/// - ❌ Caching an address between calls (each cycle must observe reality)
/// - ❌ Retry logic or backoff
/// - ❌ Touching DNS records or the last-known-IP store
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Fetch the current public IP address as text
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The raw response body (may contain whitespace)
    /// - `Err(Error)`: If the source is unreachable or returned an error
    async fn fetch_current_ip(&self) -> Result<String, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing IP sources from configuration
pub trait IpSourceFactory: Send + Sync {
    /// Create an IpSource instance from configuration
    fn create(
        &self,
        config: &crate::config::IpSourceConfig,
    ) -> Result<Box<dyn IpSource>, crate::Error>;
}
