//! Core data model: certification records and watchlist entries
//!
//! A `Record` is a snapshot of one externally certified terminal model as
//! returned by the registry. Two records are equivalent iff all five fields
//! match exactly; the monitor relies on this for field-level diffing.

use serde::{Deserialize, Serialize};

/// Snapshot of one certified terminal model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Model name, the matching key used for equality against a query
    pub name: String,
    /// Certification number assigned by the registry
    pub cert_number: String,
    /// Device identifier (first token of the registry column)
    pub identifier: String,
    /// Certification date as published (opaque, no date parsing)
    pub certified_date: String,
    /// Expiry date as published (may be empty)
    pub expiry_date: String,
}

impl Record {
    /// Human-readable summary used in command replies and notifications
    pub fn summary(&self) -> String {
        format!(
            "[{}] {}\n - identifier: {}\n - certified: {}\n - expires: {}",
            self.cert_number, self.name, self.identifier, self.certified_date, self.expiry_date
        )
    }
}

/// Composite identity of a watchlist entry
///
/// `cert_number` is empty for models registered before the registry knows
/// them. At most one entry per distinct key exists in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchKey {
    pub name: String,
    pub cert_number: String,
}

impl WatchKey {
    pub fn new(name: &str, cert_number: &str) -> Self {
        Self {
            name: name.to_string(),
            cert_number: cert_number.to_string(),
        }
    }

    /// Key for a bare registration (model not yet known to the registry)
    pub fn bare(name: &str) -> Self {
        Self::new(name, "")
    }
}

/// One watchlist row
///
/// Invariant: `last_known.name == key.name` whenever `last_known` is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry {
    pub key: WatchKey,
    /// Last record snapshot; `None` for newly registered, not-yet-found models
    pub last_known: Option<Record>,
    /// Destination handle for change notifications; may be empty
    pub notify_target: String,
}

impl WatchEntry {
    /// Entry for a model the registry already knows
    pub fn from_record(record: Record, notify_target: &str) -> Self {
        Self {
            key: WatchKey::new(&record.name, &record.cert_number),
            last_known: Some(record),
            notify_target: notify_target.to_string(),
        }
    }

    /// Entry for a model registered ahead of its certification
    pub fn bare(name: &str, notify_target: &str) -> Self {
        Self {
            key: WatchKey::bare(name),
            last_known: None,
            notify_target: notify_target.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(name: &str) -> Record {
        Record {
            name: name.to_string(),
            cert_number: "KSEL-2024-0001".to_string(),
            identifier: "ID-100".to_string(),
            certified_date: "2024-01-15".to_string(),
            expiry_date: "2027-01-14".to_string(),
        }
    }

    #[test]
    fn record_equivalence_is_full_field() {
        let a = sample_record("KTC-K501");
        let mut b = a.clone();
        assert_eq!(a, b);

        b.expiry_date = "2028-01-14".to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn entry_from_record_keeps_name_invariant() {
        let record = sample_record("KTC-K501");
        let entry = WatchEntry::from_record(record.clone(), "channel-1");
        assert_eq!(entry.key.name, record.name);
        assert_eq!(
            entry.last_known.as_ref().map(|r| r.name.as_str()),
            Some("KTC-K501")
        );
    }

    #[test]
    fn bare_entry_has_empty_cert_number() {
        let entry = WatchEntry::bare("NEW-MODEL", "");
        assert_eq!(entry.key.cert_number, "");
        assert!(entry.last_known.is_none());
    }
}
