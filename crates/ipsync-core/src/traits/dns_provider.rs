// # DNS Provider Trait
//
// Defines the interface for reading and overwriting DNS A records.
//
// ## Implementations
//
// - Cloudflare: `ipsync-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ipsync_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//     let target = /* RecordTarget from configuration */;
//
//     if provider.read_record(&target.zone, &target.name).await?.is_none() {
//         provider.write_record(&target, "203.0.113.5".parse()?).await?;
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

use crate::target::{RecordTarget, Zone};

/// What a successful `write_record` call actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The provider changed the record and confirmed it
    Applied,
    /// Dry-run: the write was only logged, the record is unchanged
    Simulated,
}

/// Trait for DNS provider implementations
///
/// # Trust Level: Untrusted
///
/// Providers are isolated, stateless and single-shot.
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure (the Reconciler decides what happens next)
///
/// ## Forbidden Capabilities
/// - ❌ Retry logic or backoff (one attempt per record per cycle)
/// - ❌ Access the last-known-IP store
/// - ❌ Decide whether an update is needed
/// - ❌ Cache record content between calls
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Read the current content of an A record
    ///
    /// # Parameters
    ///
    /// - `zone`: The zone owning the record (carries the API token)
    /// - `record_name`: The fully qualified record name
    ///
    /// # Returns
    ///
    /// - `Ok(Some(content))`: Exactly one A record exists with this content
    /// - `Ok(None)`: No matching record, or the match is ambiguous
    /// - `Err(Error)`: The request failed
    async fn read_record(
        &self,
        zone: &Zone,
        record_name: &str,
    ) -> Result<Option<String>, crate::Error>;

    /// Overwrite an A record's content
    ///
    /// `Ok(WriteOutcome::Applied)` is returned only when the provider
    /// confirmed success. A provider in dry-run mode returns
    /// `Ok(WriteOutcome::Simulated)` without contacting the API. Every other
    /// outcome is an error. `target.proxied` is forwarded verbatim.
    async fn write_record(
        &self,
        target: &RecordTarget,
        new_ip: Ipv4Addr,
    ) -> Result<WriteOutcome, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
