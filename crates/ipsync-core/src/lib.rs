// # ipsync-core
//
// Core library for the ipsync dynamic DNS updater.
//
// ## Architecture Overview
//
// One reconciliation cycle keeps a set of DNS "A" records pointing at the
// caller's current public IPv4 address:
// - **IpSource**: Capability that fetches the current public IP as text
// - **DnsProvider**: Capability that reads and overwrites A records
// - **LastIpStore**: A single persisted last-known-IP scalar
// - **Reconciler**: Decides which records are out of sync and converges them
// - **ProviderRegistry**: Builds adapters from configuration by type name
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decision logic lives here, I/O lives in adapters
// 2. **Conservative**: Unknown record state is treated as out of sync
// 3. **Fail-Fast Writes**: The first failed write ends the write loop
// 4. **Gated Persistence**: The store is written only after a fully successful cycle
// 5. **Idempotency**: Running a cycle twice in a row is a no-op the second time

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod state;
pub mod target;
pub mod traits;

// Re-export core types for convenience
pub use config::{IpSourceConfig, ProviderConfig, StateStoreConfig, SyncConfig};
pub use engine::{CycleEvent, CycleOutcome, CycleReport, Reconciler, StoreStatus};
pub use error::{Error, Result};
pub use registry::ProviderRegistry;
pub use state::{FileLastIpStore, MemoryLastIpStore};
pub use target::{RecordTarget, Zone};
pub use traits::{DnsProvider, IpSource, LastIpStore, WriteOutcome};
