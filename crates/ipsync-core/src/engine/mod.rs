//! Reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Fetching the current public IP via IpSource
//! - Reading every configured record via DnsProvider
//! - Computing the update set (records out of sync, or of unknown state)
//! - Writing the update set in order, stopping at the first failure
//! - Verifying each write by reading the record back
//! - Persisting the new last-known IP only after a fully successful cycle
//!
//! A provider in dry-run mode reports its writes as simulated. Such a cycle
//! ends as `DryRun` and never touches the last-known-IP store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐          ┌──────────────┐          ┌──────────────┐
//! │  IpSource   │─ fetch ─▶│  Reconciler  │◀─ load ──│ LastIpStore  │
//! └─────────────┘          └──────────────┘── save ─▶└──────────────┘
//!                             │        │
//!                  read/write │        │ CycleEvent
//!                             ▼        ▼
//!                     ┌─────────────┐  ┌─────────────┐
//!                     │ DnsProvider │  │   Events    │
//!                     └─────────────┘  └─────────────┘
//! ```
//!
//! ## Cycle State Machine
//!
//! ```text
//! START → FETCH_CURRENT_IP → {FATAL_ABORT | LOAD_LAST_IP} → READ_RECORDS
//!       → COMPUTE_DIFF → {DONE_NO_OP | WRITE_LOOP} → {DONE_FAILURE | DONE_DRY_RUN | DONE_SUCCESS}
//! ```
//!
//! A shutdown request observed between records ends the cycle as
//! `Cancelled`; a write in flight is always allowed to finish.

use std::net::Ipv4Addr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::target::RecordTarget;
use crate::traits::{DnsProvider, IpSource, LastIpStore, WriteOutcome};

/// Capacity of the event channel returned by [`Reconciler::new`]
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleEvent {
    /// Cycle started
    CycleStarted { records_count: usize },

    /// Current IP fetched and last-known IP loaded
    CurrentIpFetched {
        current_ip: Ipv4Addr,
        last_known_ip: Option<String>,
    },

    /// Cycle aborted before any record was read
    CycleAborted { error: String },

    /// A record's current DNS content was read
    RecordObserved {
        record_name: String,
        observed_ip: String,
    },

    /// A record could not be read (or was missing/ambiguous)
    RecordReadFailed { record_name: String, error: String },

    /// Record already points at the current IP
    UpdateSkipped {
        record_name: String,
        current_ip: Ipv4Addr,
    },

    /// Record was written
    UpdateSucceeded {
        record_name: String,
        new_ip: Ipv4Addr,
        previous_ip: Option<String>,
    },

    /// Dry-run provider logged the write without performing it
    UpdateSimulated {
        record_name: String,
        new_ip: Ipv4Addr,
    },

    /// Record write failed; the write loop stopped here
    UpdateFailed { record_name: String, error: String },

    /// Read-back after a successful write did not show the new IP
    VerificationMismatch {
        record_name: String,
        expected: Ipv4Addr,
        observed: Option<String>,
    },

    /// Last-known IP persisted
    StorePersisted { ip: Ipv4Addr },

    /// Last-known IP could not be persisted
    StorePersistFailed { error: String },

    /// Cycle reached a terminal state
    CycleFinished { outcome: CycleOutcome },
}

/// Terminal classification of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every record already matched; nothing was written
    NoOp,
    /// Every record in the update set was written
    Updated,
    /// Dry-run: writes were only logged and the store was left alone
    DryRun,
    /// A write failed; remaining records were not attempted
    Failed,
    /// A shutdown request interrupted the cycle between records
    Cancelled,
}

/// What happened to the last-known-IP store at the end of a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    /// Current IP was written
    Persisted,
    /// Not written (already current, or the cycle did not fully succeed)
    Skipped,
    /// Write attempted and failed; DNS outcome is unaffected
    Failed(String),
}

/// Summary of one reconciliation cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Terminal outcome
    pub outcome: CycleOutcome,
    /// Current public IP for this cycle
    pub current_ip: Ipv4Addr,
    /// Last-known IP loaded at cycle start
    pub last_known_ip: Option<String>,
    /// Whether the current IP differs from the last-known one
    pub ip_changed: bool,
    /// Observed DNS content per record, in processing order (`None` = unknown)
    pub observed: Vec<(String, Option<String>)>,
    /// Names of records that needed a write
    pub update_set: Vec<String>,
    /// Names of records successfully written
    pub written: Vec<String>,
    /// Names of records a dry-run provider would have written
    pub simulated: Vec<String>,
    /// Record whose write failed, if any
    pub failed_record: Option<String>,
    /// Records whose read-back did not match after a successful write
    pub verification_warnings: Vec<String>,
    /// Last-known-IP store status
    pub store: StoreStatus,
    /// When the cycle started
    pub started_at: DateTime<Utc>,
    /// When the cycle finished
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    fn new(current_ip: Ipv4Addr, last_known_ip: Option<String>, started_at: DateTime<Utc>) -> Self {
        let ip_changed = last_known_ip.as_deref() != Some(current_ip.to_string().as_str());
        Self {
            outcome: CycleOutcome::NoOp,
            current_ip,
            last_known_ip,
            ip_changed,
            observed: Vec::new(),
            update_set: Vec::new(),
            written: Vec::new(),
            simulated: Vec::new(),
            failed_record: None,
            verification_warnings: Vec::new(),
            store: StoreStatus::Skipped,
            started_at,
            finished_at: started_at,
        }
    }

    /// `true` for `NoOp`, `Updated` and `DryRun`
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            CycleOutcome::NoOp | CycleOutcome::Updated | CycleOutcome::DryRun
        )
    }
}

/// Compare two IP strings, ignoring incidental whitespace
pub fn ips_match(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

/// Validate raw IP source output as an IPv4 address
pub fn parse_current_ip(raw: &str) -> Result<Ipv4Addr> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::ip_source("IP source returned an empty response"));
    }

    trimmed
        .parse()
        .map_err(|_| Error::ip_source(format!("IP source returned an invalid IPv4 address: {}", trimmed)))
}

/// Core reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Call [`Reconciler::run_cycle()`] from any scheduler, or
/// 3. Let [`Reconciler::run_with_shutdown()`] loop on a fixed interval
///
/// ## Threading
///
/// A cycle is strictly sequential: records are read, written and verified
/// one at a time in configured order.
pub struct Reconciler {
    /// IP source for the current public IP
    ip_source: Box<dyn IpSource>,

    /// DNS provider for reading and writing records
    provider: Box<dyn DnsProvider>,

    /// Last-known-IP store
    store: Box<dyn LastIpStore>,

    /// Records to keep in sync, in processing order
    targets: Vec<RecordTarget>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<CycleEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields cycle events
    pub fn new(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        store: Box<dyn LastIpStore>,
        targets: Vec<RecordTarget>,
    ) -> Result<(Self, mpsc::Receiver<CycleEvent>)> {
        if targets.is_empty() {
            return Err(Error::config("No records configured"));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let reconciler = Self {
            ip_source,
            provider,
            store,
            targets,
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Run one reconciliation cycle
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: The cycle reached a terminal state (including a failed write)
    /// - `Err(Error)`: The IP source failed; nothing was read, written or persisted
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let (_tx, rx) = watch::channel(false);
        self.run_cycle_with_shutdown(&rx).await
    }

    /// Run one reconciliation cycle, honouring a shutdown flag between records
    pub async fn run_cycle_with_shutdown(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleReport> {
        let started_at = Utc::now();
        self.emit_event(CycleEvent::CycleStarted {
            records_count: self.targets.len(),
        });

        let current_ip = match self.fetch_current_ip().await {
            Ok(ip) => ip,
            Err(e) => {
                error!("Cycle aborted, could not determine current IP: {}", e);
                self.emit_event(CycleEvent::CycleAborted {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let last_known_ip = self.load_last_known_ip().await;
        info!(
            "Current IP: {} (last known: {})",
            current_ip,
            last_known_ip.as_deref().unwrap_or("unknown")
        );
        self.emit_event(CycleEvent::CurrentIpFetched {
            current_ip,
            last_known_ip: last_known_ip.clone(),
        });

        let mut report = CycleReport::new(current_ip, last_known_ip, started_at);
        let current = current_ip.to_string();

        // Diff: every record whose content is not the current IP, or unknown.
        // The observed value travels with its target so names may repeat
        // across zones.
        let mut update_set: Vec<(&RecordTarget, Option<String>)> = Vec::new();
        for target in &self.targets {
            if *shutdown.borrow() {
                return Ok(self.finish(report, CycleOutcome::Cancelled));
            }

            let observed = self.observe(target).await;
            match observed.as_deref() {
                Some(ip) if ips_match(ip, &current) => {
                    debug!("Record {} already has IP {}, skipping update", target, current);
                    self.emit_event(CycleEvent::UpdateSkipped {
                        record_name: target.name.clone(),
                        current_ip,
                    });
                }
                Some(ip) => {
                    info!("Record {} has IP {}, needs update to {}", target, ip.trim(), current);
                    update_set.push((target, Some(ip.trim().to_string())));
                }
                None => {
                    info!("Record {} has unknown content, will update to {}", target, current);
                    update_set.push((target, None));
                }
            }
            report.observed.push((target.name.clone(), observed));
        }

        report.update_set = update_set.iter().map(|(t, _)| t.name.clone()).collect();

        if update_set.is_empty() {
            // Opportunistic refresh: DNS is already right but the store is stale
            if report.ip_changed {
                report.store = self.persist(current_ip).await;
            }
            info!(
                "All {} record(s) already point at {}, no update needed",
                self.targets.len(),
                current
            );
            return Ok(self.finish(report, CycleOutcome::NoOp));
        }

        info!(
            "{} of {} record(s) need updating",
            update_set.len(),
            self.targets.len()
        );

        for (target, previous_ip) in update_set {
            if *shutdown.borrow() {
                return Ok(self.finish(report, CycleOutcome::Cancelled));
            }

            match self.provider.write_record(target, current_ip).await {
                Ok(WriteOutcome::Simulated) => {
                    info!("[DRY-RUN] Would update {} -> {}", target, current_ip);
                    self.emit_event(CycleEvent::UpdateSimulated {
                        record_name: target.name.clone(),
                        new_ip: current_ip,
                    });
                    report.simulated.push(target.name.clone());
                }
                Ok(WriteOutcome::Applied) => {
                    info!("Updated {} -> {}", target, current_ip);
                    self.emit_event(CycleEvent::UpdateSucceeded {
                        record_name: target.name.clone(),
                        new_ip: current_ip,
                        previous_ip,
                    });
                    report.written.push(target.name.clone());

                    if !self.verify(target, current_ip).await {
                        report.verification_warnings.push(target.name.clone());
                    }
                }
                Err(e) => {
                    error!("Failed to update record {}: {}", target, e);
                    self.emit_event(CycleEvent::UpdateFailed {
                        record_name: target.name.clone(),
                        error: e.to_string(),
                    });
                    report.failed_record = Some(target.name.clone());
                    return Ok(self.finish(report, CycleOutcome::Failed));
                }
            }
        }

        // Simulated writes left DNS unchanged, so the store must not move
        if !report.simulated.is_empty() {
            return Ok(self.finish(report, CycleOutcome::DryRun));
        }

        report.store = self.persist(current_ip).await;
        Ok(self.finish(report, CycleOutcome::Updated))
    }

    /// Run cycles on a fixed interval until `shutdown` becomes `true`
    ///
    /// With `Duration::ZERO` a single cycle runs and its result is returned:
    /// a fatal IP source error or a failed write is an `Err`. In loop mode
    /// those are logged and the loop waits for the next tick.
    pub async fn run_with_shutdown(
        &self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        if interval.is_zero() {
            let report = self.run_cycle_with_shutdown(&shutdown).await?;
            return match report.outcome {
                CycleOutcome::Failed => Err(Error::dns_write(format!(
                    "Failed to update record {}",
                    report.failed_record.unwrap_or_default()
                ))),
                _ => Ok(()),
            };
        }

        info!("Running every {:?}", interval);

        loop {
            if let Err(e) = self.run_cycle_with_shutdown(&shutdown).await {
                warn!("Cycle skipped, waiting for next run: {}", e);
            }

            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        info!("Shutdown signal received, reconciler stopped");
        Ok(())
    }

    async fn fetch_current_ip(&self) -> Result<Ipv4Addr> {
        let raw = match self.ip_source.fetch_current_ip().await {
            Ok(raw) => raw,
            Err(e @ Error::IpSource(_)) => return Err(e),
            Err(e) => {
                return Err(Error::ip_source(format!(
                    "{} unreachable: {}",
                    self.ip_source.source_name(),
                    e
                )));
            }
        };

        parse_current_ip(&raw)
    }

    /// Load the last-known IP; any failure reads as "unknown"
    async fn load_last_known_ip(&self) -> Option<String> {
        match self.store.load().await {
            Ok(ip) => ip.map(|ip| ip.trim().to_string()).filter(|ip| !ip.is_empty()),
            Err(e) => {
                debug!("Last IP store unreadable, treating as unknown: {}", e);
                None
            }
        }
    }

    /// Read a record's current content; `None` when missing, ambiguous or failed
    async fn observe(&self, target: &RecordTarget) -> Option<String> {
        match self.provider.read_record(&target.zone, &target.name).await {
            Ok(Some(ip)) => {
                debug!("Record {} currently has IP {}", target, ip.trim());
                self.emit_event(CycleEvent::RecordObserved {
                    record_name: target.name.clone(),
                    observed_ip: ip.trim().to_string(),
                });
                Some(ip)
            }
            Ok(None) => {
                warn!("No unique A record found for {}", target);
                self.emit_event(CycleEvent::RecordReadFailed {
                    record_name: target.name.clone(),
                    error: "record not found or ambiguous".to_string(),
                });
                None
            }
            Err(e) => {
                warn!("Failed to read record {}: {}", target, e);
                self.emit_event(CycleEvent::RecordReadFailed {
                    record_name: target.name.clone(),
                    error: e.to_string(),
                });
                None
            }
        }
    }

    /// Read a record back after a write; mismatches are warnings only
    async fn verify(&self, target: &RecordTarget, expected: Ipv4Addr) -> bool {
        let observed = match self.provider.read_record(&target.zone, &target.name).await {
            Ok(ip) => ip,
            Err(e) => {
                debug!("Verification read failed for {}: {}", target, e);
                None
            }
        };

        if observed
            .as_deref()
            .is_some_and(|ip| ips_match(ip, &expected.to_string()))
        {
            debug!("Verified {} -> {}", target, expected);
            return true;
        }

        warn!(
            "Verification mismatch for {}: expected {}, found {}",
            target,
            expected,
            observed.as_deref().map(str::trim).unwrap_or("nothing")
        );
        self.emit_event(CycleEvent::VerificationMismatch {
            record_name: target.name.clone(),
            expected,
            observed: observed.map(|ip| ip.trim().to_string()),
        });
        false
    }

    async fn persist(&self, ip: Ipv4Addr) -> StoreStatus {
        match self.store.save(&ip.to_string()).await {
            Ok(()) => {
                debug!("Saved last known IP {}", ip);
                self.emit_event(CycleEvent::StorePersisted { ip });
                StoreStatus::Persisted
            }
            Err(e) => {
                warn!(
                    "DNS is up to date but the last known IP could not be saved (store out of sync): {}",
                    e
                );
                self.emit_event(CycleEvent::StorePersistFailed {
                    error: e.to_string(),
                });
                StoreStatus::Failed(e.to_string())
            }
        }
    }

    /// Stamp the report, log the terminal line and emit the final event
    fn finish(&self, mut report: CycleReport, outcome: CycleOutcome) -> CycleReport {
        report.outcome = outcome;
        report.finished_at = Utc::now();

        match outcome {
            CycleOutcome::NoOp => {}
            CycleOutcome::Updated => info!(
                "All {} record(s) updated to {}",
                report.written.len(),
                report.current_ip
            ),
            CycleOutcome::DryRun => info!(
                "[DRY-RUN] {} record(s) would be updated to {}; last known IP not saved",
                report.simulated.len(),
                report.current_ip
            ),
            CycleOutcome::Failed => error!(
                "Failed to update record {} after {} successful update(s); last known IP not saved",
                report.failed_record.as_deref().unwrap_or("unknown"),
                report.written.len()
            ),
            CycleOutcome::Cancelled => warn!(
                "Cycle cancelled after {} update(s); last known IP not saved",
                report.written.len()
            ),
        }

        self.emit_event(CycleEvent::CycleFinished { outcome });
        report
    }

    /// Emit a cycle event
    fn emit_event(&self, event: CycleEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        // Sender gone: no shutdown can ever arrive
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ips_match_ignores_whitespace() {
        assert!(ips_match("203.0.113.5\n", "203.0.113.5"));
        assert!(ips_match("  203.0.113.5", "203.0.113.5 \r\n"));
        assert!(!ips_match("203.0.113.5", "203.0.113.50"));
    }

    #[test]
    fn test_parse_current_ip() {
        assert_eq!(
            parse_current_ip("203.0.113.5\n").unwrap(),
            Ipv4Addr::new(203, 0, 113, 5)
        );
        assert!(matches!(parse_current_ip("  \n"), Err(Error::IpSource(_))));
        assert!(matches!(parse_current_ip("<html>"), Err(Error::IpSource(_))));
        assert!(matches!(parse_current_ip("2001:db8::1"), Err(Error::IpSource(_))));
    }

    #[test]
    fn test_report_ip_changed() {
        let now = Utc::now();
        let ip = Ipv4Addr::new(203, 0, 113, 50);

        assert!(CycleReport::new(ip, None, now).ip_changed);
        assert!(CycleReport::new(ip, Some("192.168.1.100".into()), now).ip_changed);
        assert!(!CycleReport::new(ip, Some("203.0.113.50".into()), now).ip_changed);
    }

    #[test]
    fn test_report_success_classification() {
        let mut report = CycleReport::new(Ipv4Addr::LOCALHOST, None, Utc::now());
        assert!(report.is_success());

        report.outcome = CycleOutcome::DryRun;
        assert!(report.is_success());

        report.outcome = CycleOutcome::Failed;
        assert!(!report.is_success());

        report.outcome = CycleOutcome::Cancelled;
        assert!(!report.is_success());
    }
}
