//! Capability traits consumed by the Reconciler
//!
//! - [`IpSource`]: Fetch the caller's current public IP
//! - [`DnsProvider`]: Read and overwrite DNS A records
//! - [`LastIpStore`]: Persist the last-known-IP scalar

pub mod dns_provider;
pub mod ip_source;
pub mod state_store;

pub use dns_provider::{DnsProvider, DnsProviderFactory, WriteOutcome};
pub use ip_source::{IpSource, IpSourceFactory};
pub use state_store::LastIpStore;
