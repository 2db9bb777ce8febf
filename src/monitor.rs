//! Change monitor
//!
//! A long-lived loop that re-queries the registry for every watched entry
//! once per interval, diffs the fresh record against the stored snapshot and
//! emits notifications for changes, newly published certifications and
//! disappearances.
//!
//! Eviction policy: keep-watching. A change or a newly published
//! certification replaces the snapshot and the entry stays on the watchlist;
//! a disappearance is reported once and evicts the entry so it can never
//! fire again.

use chrono::{Local, Timelike};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::lookup::Lookup;
use crate::model::{Record, WatchEntry};
use crate::notify::Notifier;
use crate::store::WatchlistStore;

/// Monitor scheduling configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between cycles
    pub interval: Duration,
    /// Per-entry lookup timeout within a cycle
    pub lookup_timeout: Duration,
    /// First local hour (inclusive) of the active window
    pub window_start_hour: u32,
    /// Last local hour (exclusive); equal hours keep the monitor always active
    pub window_end_hour: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            lookup_timeout: Duration::from_secs(10),
            window_start_hour: 0,
            window_end_hour: 0,
        }
    }
}

pub struct ChangeMonitor {
    store: Arc<WatchlistStore>,
    lookup: Arc<dyn Lookup>,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
}

impl ChangeMonitor {
    pub fn new(
        store: Arc<WatchlistStore>,
        lookup: Arc<dyn Lookup>,
        notifier: Arc<dyn Notifier>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            lookup,
            notifier,
            config,
        }
    }

    /// Start the monitoring loop
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        info!(
            interval_secs = self.config.interval.as_secs(),
            window_start = self.config.window_start_hour,
            window_end = self.config.window_end_hour,
            "Change monitor started"
        );

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.config.interval).await;

                let hour = Local::now().hour();
                if !window_active(hour, self.config.window_start_hour, self.config.window_end_hour)
                {
                    debug!(hour, "Monitor cycle skipped (outside active window)");
                    continue;
                }

                self.run_cycle().await;
            }
        })
    }

    /// One pass over a snapshot of the watchlist
    ///
    /// Entries are checked concurrently, each under its own timeout; one
    /// entry failing never blocks the rest and never ends the loop.
    pub async fn run_cycle(&self) {
        let entries = self.store.list();
        if entries.is_empty() {
            debug!("Monitor cycle: watchlist empty");
            return;
        }

        let outcomes = join_all(entries.iter().map(|e| self.check_entry(e))).await;
        let events = outcomes.into_iter().filter(|fired| *fired).count();
        info!(
            checked = entries.len(),
            events, "Monitor cycle complete"
        );
    }

    /// Re-query one entry and react to what came back; returns whether an
    /// event fired
    async fn check_entry(&self, entry: &WatchEntry) -> bool {
        let name = &entry.key.name;

        let lookup = tokio::time::timeout(self.config.lookup_timeout, self.lookup.lookup(name));
        let candidates = match lookup.await {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                warn!(model = %name, error = %e, "Lookup failed, no result this cycle");
                return false;
            }
            Err(_) => {
                warn!(model = %name, "Lookup timed out, no result this cycle");
                return false;
            }
        };

        // Only a candidate whose name matches the key exactly counts
        let current = candidates.into_iter().find(|r| &r.name == name);

        match (&entry.last_known, current) {
            // Still unpublished, nothing to report
            (None, None) => false,

            // Certification newly published for a bare registration
            (None, Some(fresh)) => {
                let text = format!("Certification published:\n{}", fresh.summary());
                self.deliver(entry, &text).await;
                self.update_snapshot(entry, fresh);
                true
            }

            (Some(old), Some(fresh)) => {
                if *old == fresh {
                    return false;
                }
                let text = format!(
                    "Certification changed for [{}]:\n{}",
                    name,
                    diff_text(old, &fresh)
                );
                self.deliver(entry, &text).await;
                self.update_snapshot(entry, fresh);
                true
            }

            // Previously known record no longer returned by the registry
            (Some(old), None) => {
                let text = format!(
                    "Certification no longer listed:\n{}\nRemoved from the watchlist.",
                    old.summary()
                );
                self.deliver(entry, &text).await;
                if let Err(e) = self.store.remove_key(&entry.key) {
                    warn!(model = %name, error = %e, "Eviction after disappearance failed");
                }
                true
            }
        }
    }

    /// Fire-and-forget delivery; an empty target skips the send entirely
    async fn deliver(&self, entry: &WatchEntry, text: &str) {
        if entry.notify_target.is_empty() {
            debug!(model = %entry.key.name, "Notification skipped (no target)");
            return;
        }
        if let Err(e) = self.notifier.send(&entry.notify_target, text, &[]).await {
            warn!(model = %entry.key.name, error = %e, "Notification delivery failed");
        }
    }

    fn update_snapshot(&self, entry: &WatchEntry, fresh: Record) {
        if let Err(e) = self.store.replace_snapshot(&entry.key, Some(fresh)) {
            warn!(model = %entry.key.name, error = %e, "Snapshot update failed");
        }
    }
}

/// Whether the local hour falls inside the active window
///
/// Start == end means always active; start > end wraps past midnight.
fn window_active(hour: u32, start: u32, end: u32) -> bool {
    if start == end {
        true
    } else if start < end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// Field-by-field old to new description of a change
fn diff_text(old: &Record, new: &Record) -> String {
    let mut lines = Vec::new();
    let fields = [
        ("cert number", &old.cert_number, &new.cert_number),
        ("identifier", &old.identifier, &new.identifier),
        ("certified", &old.certified_date, &new.certified_date),
        ("expires", &old.expiry_date, &new.expiry_date),
    ];
    for (label, before, after) in fields {
        if before != after {
            lines.push(format!(" - {label}: {before} -> {after}"));
        }
    }
    lines.join("\n")
}
