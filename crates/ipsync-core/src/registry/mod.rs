//! Plugin-based provider registry
//!
//! The registry allows DNS providers and IP sources to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ipsync_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! ipsync_provider_cloudflare::register(&registry);
//! ipsync_ip_http::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! let ip_source = registry.create_ip_source(&config.ip_source)?;
//! let store = registry.create_state_store(&config.state_store).await?;
//! ```

use crate::config::{IpSourceConfig, ProviderConfig, StateStoreConfig};
use crate::error::{Error, Result};
use crate::state::{FileLastIpStore, MemoryLastIpStore};
use crate::traits::{DnsProvider, DnsProviderFactory, IpSource, IpSourceFactory, LastIpStore};
use std::collections::HashMap;
use std::sync::RwLock;

/// Provider registry for plugin-based adapter creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,

    /// Registered IP source factories
    ip_sources: RwLock<HashMap<String, Box<dyn IpSourceFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory under a type name (e.g. "cloudflare")
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        providers.insert(name.into(), factory);
    }

    /// Register an IP source factory under a type name (e.g. "http")
    pub fn register_ip_source(&self, name: impl Into<String>, factory: Box<dyn IpSourceFactory>) {
        let mut sources = self
            .ip_sources
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sources.insert(name.into(), factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create an IP source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn IpSource>)`: Created IP source instance
    /// - `Err(Error)`: If source type is not registered or creation fails
    pub fn create_ip_source(&self, config: &IpSourceConfig) -> Result<Box<dyn IpSource>> {
        let source_type = config.type_name();
        let sources = self
            .ip_sources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown IP source type: {}", source_type)))?;

        factory.create(config)
    }

    /// Create one of the built-in last-known-IP stores
    pub async fn create_state_store(
        &self,
        config: &StateStoreConfig,
    ) -> Result<Box<dyn LastIpStore>> {
        match config {
            StateStoreConfig::File { path } => Ok(Box::new(FileLastIpStore::new(path).await?)),
            StateStoreConfig::Memory => Ok(Box::new(MemoryLastIpStore::new())),
        }
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        providers.keys().cloned().collect()
    }

    /// List all registered IP source types
    pub fn list_ip_sources(&self) -> Vec<String> {
        let sources = self
            .ip_sources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sources.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        providers.contains_key(name)
    }

    /// Check if an IP source type is registered
    pub fn has_ip_source(&self, name: &str) -> bool {
        let sources = self
            .ip_sources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sources.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{RecordTarget, Zone};
    use crate::traits::WriteOutcome;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;

    struct StubProvider;

    #[async_trait]
    impl DnsProvider for StubProvider {
        async fn read_record(&self, _zone: &Zone, _record_name: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn write_record(
            &self,
            _target: &RecordTarget,
            _new_ip: Ipv4Addr,
        ) -> Result<WriteOutcome> {
            Ok(WriteOutcome::Applied)
        }

        fn provider_name(&self) -> &'static str {
            "stub"
        }
    }

    struct StubProviderFactory;

    impl DnsProviderFactory for StubProviderFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
            Ok(Box::new(StubProvider))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();

        // Initially empty
        assert!(!registry.has_provider("stub"));

        registry.register_provider("stub", Box::new(StubProviderFactory));

        assert!(registry.has_provider("stub"));
        assert!(registry.list_providers().contains(&"stub".to_string()));
    }

    #[test]
    fn test_create_provider_by_custom_type() {
        let registry = ProviderRegistry::new();
        registry.register_provider("stub", Box::new(StubProviderFactory));

        let config = ProviderConfig::Custom {
            factory: "stub".to_string(),
            config: serde_json::json!({}),
        };
        let provider = registry.create_provider(&config).unwrap();
        assert_eq!(provider.provider_name(), "stub");
    }

    #[test]
    fn test_unknown_types_are_config_errors() {
        let registry = ProviderRegistry::new();

        let provider = registry.create_provider(&ProviderConfig::default());
        assert!(matches!(provider, Err(Error::Config(_))));

        let source = registry.create_ip_source(&IpSourceConfig::default());
        assert!(matches!(source, Err(Error::Config(_))));
        assert!(registry.list_ip_sources().is_empty());
    }

    #[tokio::test]
    async fn test_create_builtin_state_stores() {
        let registry = ProviderRegistry::new();

        let memory = registry
            .create_state_store(&StateStoreConfig::Memory)
            .await
            .unwrap();
        assert_eq!(memory.load().await.unwrap(), None);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last-ip.txt");
        let file = registry
            .create_state_store(&StateStoreConfig::File {
                path: path.to_string_lossy().into_owned(),
            })
            .await
            .unwrap();
        file.save("203.0.113.5").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap().trim(),
            "203.0.113.5"
        );
    }
}
