// # Memory Last-Known-IP Store
//
// In-memory implementation of LastIpStore.
//
// ## Crash Behavior
//
// - The value is lost on restart
// - The first cycle after a restart sees "unknown" and evaluates every record
//
// ## When to Use
//
// - Testing environments
// - Looping deployments where re-reading DNS once per restart is harmless

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::LastIpStore;

/// In-memory last-known-IP store
///
/// # Example
///
/// ```rust,no_run
/// use ipsync_core::state::MemoryLastIpStore;
/// use ipsync_core::traits::LastIpStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryLastIpStore::new();
///
///     store.save("203.0.113.5").await?;
///     assert_eq!(store.load().await?, Some("203.0.113.5".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLastIpStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl MemoryLastIpStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a value
    pub fn with_ip(ip: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(ip.into()))),
        }
    }

    /// Forget the stored value
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

#[async_trait]
impl LastIpStore for MemoryLastIpStore {
    async fn load(&self) -> Result<Option<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string))
    }

    async fn save(&self, ip: &str) -> Result<(), Error> {
        *self.inner.write().await = Some(ip.trim().to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryLastIpStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        store.save("203.0.113.5").await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some("203.0.113.5".to_string()));

        store.clear().await;
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_trims_and_ignores_blank() {
        let store = MemoryLastIpStore::with_ip("203.0.113.5\n");
        assert_eq!(store.load().await.unwrap(), Some("203.0.113.5".to_string()));

        let blank = MemoryLastIpStore::with_ip("  \n");
        assert_eq!(blank.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clones_share_the_slot() {
        let store = MemoryLastIpStore::new();
        let handle = store.clone();

        store.save("198.51.100.7").await.unwrap();
        assert_eq!(handle.load().await.unwrap(), Some("198.51.100.7".to_string()));
    }
}
