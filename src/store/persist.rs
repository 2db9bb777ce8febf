//! Watchlist file persistence
//!
//! The watchlist is stored as a JSON array of flat objects, one per entry.
//! Writes go to a sibling temp file which is then renamed over the real one,
//! so a crash never leaves a partially written store.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::model::{Record, WatchEntry, WatchKey};
use crate::types::Result;

/// On-disk shape of one watchlist entry
///
/// Snapshot fields are empty strings when the model has not been seen in the
/// registry yet (bare registration).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedEntry {
    name: String,
    #[serde(default)]
    cert_number: String,
    #[serde(default)]
    identifier: String,
    #[serde(default)]
    certified_date: String,
    #[serde(default)]
    expiry_date: String,
    #[serde(default)]
    notify_target: String,
}

impl From<&WatchEntry> for PersistedEntry {
    fn from(entry: &WatchEntry) -> Self {
        match &entry.last_known {
            Some(record) => Self {
                name: entry.key.name.clone(),
                cert_number: record.cert_number.clone(),
                identifier: record.identifier.clone(),
                certified_date: record.certified_date.clone(),
                expiry_date: record.expiry_date.clone(),
                notify_target: entry.notify_target.clone(),
            },
            None => Self {
                name: entry.key.name.clone(),
                cert_number: entry.key.cert_number.clone(),
                identifier: String::new(),
                certified_date: String::new(),
                expiry_date: String::new(),
                notify_target: entry.notify_target.clone(),
            },
        }
    }
}

impl PersistedEntry {
    fn into_entry(self) -> WatchEntry {
        // A row with no snapshot fields is a bare registration
        let has_snapshot = !self.identifier.is_empty()
            || !self.certified_date.is_empty()
            || !self.expiry_date.is_empty();

        let last_known = has_snapshot.then(|| Record {
            name: self.name.clone(),
            cert_number: self.cert_number.clone(),
            identifier: self.identifier,
            certified_date: self.certified_date,
            expiry_date: self.expiry_date,
        });

        WatchEntry {
            key: WatchKey::new(&self.name, &self.cert_number),
            last_known,
            notify_target: self.notify_target,
        }
    }
}

/// Load the watchlist from disk; a missing file yields an empty list
pub fn load(path: &Path) -> Result<Vec<WatchEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = fs::read_to_string(path)?;
    let rows: Vec<PersistedEntry> = serde_json::from_str(&raw)?;
    Ok(rows.into_iter().map(PersistedEntry::into_entry).collect())
}

/// Atomically replace the watchlist file with the given entries
pub fn save(path: &Path, entries: &[WatchEntry]) -> Result<()> {
    let rows: Vec<PersistedEntry> = entries.iter().map(PersistedEntry::from).collect();
    let raw = serde_json::to_string_pretty(&rows)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    fs::write(&tmp, raw)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> Record {
        Record {
            name: name.to_string(),
            cert_number: "C-1".to_string(),
            identifier: "ID-1".to_string(),
            certified_date: "2024-01-01".to_string(),
            expiry_date: "2027-01-01".to_string(),
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = load(&dir.path().join("absent.json")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn round_trips_snapshot_and_bare_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");

        let entries = vec![
            WatchEntry::from_record(record("KTC-K501"), "channel-1"),
            WatchEntry::bare("NEW-MODEL", ""),
        ];
        save(&path, &entries).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, entries);
        assert!(loaded[1].last_known.is_none());
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");

        save(&path, &[WatchEntry::bare("A", "")]).unwrap();
        save(&path, &[WatchEntry::bare("B", "")]).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].key.name, "B");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
