//! Test doubles and common utilities for reconciliation contract tests
//!
//! Every double is cheaply cloneable and clones share state, so a test can
//! hand one clone to the Reconciler and keep another for assertions.

#![allow(dead_code)]

use ipsync_core::error::{Error, Result};
use ipsync_core::traits::{DnsProvider, IpSource, LastIpStore};
use ipsync_core::{Reconciler, RecordTarget, WriteOutcome, Zone};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An IP source whose answer the test controls
#[derive(Clone)]
pub struct ScriptedIpSource {
    response: Arc<Mutex<Option<String>>>,
    call_count: Arc<AtomicUsize>,
}

impl ScriptedIpSource {
    pub fn new(raw: &str) -> Self {
        Self {
            response: Arc::new(Mutex::new(Some(raw.to_string()))),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the source unreachable
    pub fn unreachable() -> Self {
        let source = Self::new("");
        *source.response.lock().unwrap() = None;
        source
    }

    pub fn set(&self, raw: &str) {
        *self.response.lock().unwrap() = Some(raw.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for ScriptedIpSource {
    async fn fetch_current_ip(&self) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::http("connection refused"))
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// One call made against the mock provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Read(String),
    Write {
        record_name: String,
        new_ip: Ipv4Addr,
        proxied: bool,
    },
}

#[derive(Default)]
struct DnsState {
    /// Record name -> content, as the provider would serve it
    records: HashMap<String, String>,
    /// (zone id, record name) -> content; takes precedence over `records`
    zone_records: HashMap<(String, String), String>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    /// Writes that report success without changing the record
    ignored_writes: HashSet<String>,
    /// Dry-run: every write is reported as simulated and changes nothing
    simulate_writes: bool,
    calls: Vec<ProviderCall>,
}

/// An in-memory DNS provider that records every call
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    state: Arc<Mutex<DnsState>>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content currently served for a record
    pub fn with_record(self, name: &str, content: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .records
            .insert(name.to_string(), content.to_string());
        self
    }

    /// Set the content served for a record in one specific zone
    pub fn with_zone_record(self, zone_id: &str, name: &str, content: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .zone_records
            .insert((zone_id.to_string(), name.to_string()), content.to_string());
        self
    }

    /// Behave like a provider in dry-run mode
    pub fn simulate_writes(self) -> Self {
        self.state.lock().unwrap().simulate_writes = true;
        self
    }

    pub fn fail_reads_for(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_reads
            .insert(name.to_string());
        self
    }

    pub fn fail_writes_for(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_writes
            .insert(name.to_string());
        self
    }

    pub fn ignore_writes_for(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .ignored_writes
            .insert(name.to_string());
        self
    }

    pub fn content(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().records.get(name).cloned()
    }

    pub fn zone_content(&self, zone_id: &str, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .zone_records
            .get(&(zone_id.to_string(), name.to_string()))
            .cloned()
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Names of records a write was attempted for, in order
    pub fn write_attempts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::Write { record_name, .. } => Some(record_name),
                ProviderCall::Read(_) => None,
            })
            .collect()
    }

    pub fn read_count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ProviderCall::Read(n) if n == name))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn read_record(&self, zone: &Zone, record_name: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Read(record_name.to_string()));

        if state.failing_reads.contains(record_name) {
            return Err(Error::provider("mock", "HTTP 500"));
        }
        let key = (zone.id.clone(), record_name.to_string());
        Ok(state
            .zone_records
            .get(&key)
            .or_else(|| state.records.get(record_name))
            .cloned())
    }

    async fn write_record(&self, target: &RecordTarget, new_ip: Ipv4Addr) -> Result<WriteOutcome> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Write {
            record_name: target.name.clone(),
            new_ip,
            proxied: target.proxied,
        });

        if state.failing_writes.contains(&target.name) {
            return Err(Error::dns_write("provider did not confirm success"));
        }
        if state.simulate_writes {
            return Ok(WriteOutcome::Simulated);
        }
        if !state.ignored_writes.contains(&target.name) {
            let key = (target.zone.id.clone(), target.name.clone());
            if let Some(content) = state.zone_records.get_mut(&key) {
                *content = new_ip.to_string();
            } else {
                state
                    .records
                    .insert(target.name.clone(), new_ip.to_string());
            }
        }
        Ok(WriteOutcome::Applied)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A last-known-IP store with injectable failures
#[derive(Clone, Default)]
pub struct MockStateStore {
    value: Arc<Mutex<Option<String>>>,
    fail_load: bool,
    fail_save: bool,
    save_count: Arc<AtomicUsize>,
}

impl MockStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ip(ip: &str) -> Self {
        let store = Self::default();
        *store.value.lock().unwrap() = Some(ip.to_string());
        store
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn value(&self) -> Option<String> {
        self.value.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LastIpStore for MockStateStore {
    async fn load(&self) -> Result<Option<String>> {
        if self.fail_load {
            return Err(Error::state_store("permission denied"));
        }
        Ok(self.value.lock().unwrap().clone())
    }

    async fn save(&self, ip: &str) -> Result<()> {
        self.save_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_save {
            return Err(Error::state_store("read-only file system"));
        }
        *self.value.lock().unwrap() = Some(ip.to_string());
        Ok(())
    }
}

/// Build targets in one zone, in the given order
pub fn targets(names: &[&str]) -> Vec<RecordTarget> {
    let zone = Arc::new(Zone::new("zone-1", "example.com", "test-token"));
    names
        .iter()
        .enumerate()
        .map(|(i, name)| RecordTarget::new(format!("rec-{}", i + 1), Arc::clone(&zone), *name, false))
        .collect()
}

/// Build a reconciler from clones of the given doubles
pub fn reconciler(
    ip_source: &ScriptedIpSource,
    provider: &MockDnsProvider,
    store: &MockStateStore,
    targets: Vec<RecordTarget>,
) -> Reconciler {
    let (reconciler, _events) = Reconciler::new(
        Box::new(ip_source.clone()),
        Box::new(provider.clone()),
        Box::new(store.clone()),
        targets,
    )
    .expect("reconciler construction succeeds");
    reconciler
}
