// # Last-Known-IP Store Trait
//
// Defines the interface for the single persisted scalar that lets a cycle
// tell whether the public IP moved since the last fully successful cycle.
//
// ## Implementations
//
// - File-based: `FileLastIpStore` (plain text, atomic writes)
// - In-memory: `MemoryLastIpStore`

use async_trait::async_trait;

/// Trait for last-known-IP store implementations
///
/// The Reconciler treats a failed `load()` exactly like an empty store, and
/// a failed `save()` as a warning that never changes the cycle outcome.
#[async_trait]
pub trait LastIpStore: Send + Sync {
    /// Load the last persisted IP
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ip))`: The stored value, trimmed
    /// - `Ok(None)`: Nothing stored yet (first run, or empty slot)
    /// - `Err(Error)`: The slot exists but could not be read
    async fn load(&self) -> Result<Option<String>, crate::Error>;

    /// Persist a new IP, replacing the previous value
    async fn save(&self, ip: &str) -> Result<(), crate::Error>;
}
