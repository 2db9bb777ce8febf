//! In-memory watchlist with write-through persistence
//!
//! A single mutex serializes every mutation, so a register from the command
//! path and a concurrent snapshot update from the monitor can never
//! interleave into a half-updated entry. Entries keep insertion order for
//! user-facing listing.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::model::{Record, WatchEntry, WatchKey};
use crate::store::persist;
use crate::types::{CertwatchError, Result};

pub struct WatchlistStore {
    entries: Mutex<Vec<WatchEntry>>,
    /// Persistence path; `None` keeps the store memory-only (tests)
    path: Option<PathBuf>,
    capacity: usize,
}

impl WatchlistStore {
    /// Load the persisted watchlist, or start empty when the file is absent
    pub fn load(path: PathBuf, capacity: usize) -> Result<Self> {
        let entries = persist::load(&path)?;
        debug!(count = entries.len(), path = %path.display(), "Watchlist loaded");
        Ok(Self {
            entries: Mutex::new(entries),
            path: Some(path),
            capacity,
        })
    }

    /// Memory-only store, used by tests
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            path: None,
            capacity,
        }
    }

    fn locked(&self) -> MutexGuard<'_, Vec<WatchEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist_locked(&self, entries: &[WatchEntry]) -> Result<()> {
        match &self.path {
            Some(path) => persist::save(path, entries),
            None => Ok(()),
        }
    }

    /// Insert an entry
    ///
    /// Fails with `DuplicateKey` when an entry with the same composite key
    /// exists, unless `upsert` is set. An upsert also replaces any entry with
    /// the same name but a different cert number, so completing a
    /// registration upgrades a bare entry in place.
    pub fn add(&self, entry: WatchEntry, upsert: bool) -> Result<()> {
        let mut entries = self.locked();

        if let Some(pos) = entries.iter().position(|e| e.key == entry.key) {
            if !upsert {
                return Err(CertwatchError::DuplicateKey(entry.key.name));
            }
            entries[pos] = entry;
            return self.persist_locked(&entries);
        }

        if upsert {
            if let Some(pos) = entries.iter().position(|e| e.key.name == entry.key.name) {
                entries[pos] = entry;
                return self.persist_locked(&entries);
            }
        }

        if entries.len() >= self.capacity {
            return Err(CertwatchError::CapacityExceeded(self.capacity));
        }

        entries.push(entry);
        self.persist_locked(&entries)
    }

    /// Delete all entries whose key name matches; returns how many were
    /// removed, or `NotFound` when the name is absent
    pub fn remove(&self, name: &str) -> Result<usize> {
        let mut entries = self.locked();
        let before = entries.len();
        entries.retain(|e| e.key.name != name);
        let removed = before - entries.len();
        if removed == 0 {
            return Err(CertwatchError::NotFound(name.to_string()));
        }
        self.persist_locked(&entries)?;
        Ok(removed)
    }

    /// Delete one entry by composite key; returns whether it existed
    pub fn remove_key(&self, key: &WatchKey) -> Result<bool> {
        let mut entries = self.locked();
        let before = entries.len();
        entries.retain(|e| &e.key != key);
        let removed = before != entries.len();
        if removed {
            self.persist_locked(&entries)?;
        }
        Ok(removed)
    }

    /// Whether any entry is registered under this name
    pub fn contains(&self, name: &str) -> bool {
        self.locked().iter().any(|e| e.key.name == name)
    }

    /// Snapshot of all entries in insertion order
    pub fn list(&self) -> Vec<WatchEntry> {
        self.locked().clone()
    }

    /// Atomically replace the `last_known` snapshot of one entry
    ///
    /// A fresh snapshot also refreshes the key's cert number, so a bare
    /// entry whose certification gets published carries its real key from
    /// then on (including across a restart).
    ///
    /// Returns false when no entry with the key exists anymore (it may have
    /// been removed by a concurrent command).
    pub fn replace_snapshot(&self, key: &WatchKey, record: Option<Record>) -> Result<bool> {
        let mut entries = self.locked();
        match entries.iter_mut().find(|e| &e.key == key) {
            Some(entry) => {
                if let Some(record) = &record {
                    entry.key.cert_number = record.cert_number.clone();
                }
                entry.last_known = record;
                self.persist_locked(&entries)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn len(&self) -> usize {
        self.locked().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(name: &str, cert: &str) -> Record {
        Record {
            name: name.to_string(),
            cert_number: cert.to_string(),
            identifier: "ID-1".to_string(),
            certified_date: "2024-01-01".to_string(),
            expiry_date: "2027-01-01".to_string(),
        }
    }

    #[test]
    fn add_then_remove_then_list() {
        let store = WatchlistStore::in_memory(20);
        store
            .add(WatchEntry::from_record(record("KTC-K501", "C-1"), ""), false)
            .unwrap();

        let listed = store.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key.name, "KTC-K501");

        assert_eq!(store.remove("KTC-K501").unwrap(), 1);
        assert!(store.list().is_empty());

        let err = store.remove("KTC-K501").unwrap_err();
        assert!(matches!(err, CertwatchError::NotFound(_)));
    }

    #[test]
    fn duplicate_key_rejected_without_upsert() {
        let store = WatchlistStore::in_memory(20);
        let entry = WatchEntry::from_record(record("A", "C-1"), "");
        store.add(entry.clone(), false).unwrap();

        let err = store.add(entry, false).unwrap_err();
        assert!(matches!(err, CertwatchError::DuplicateKey(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn upsert_upgrades_bare_entry_in_place() {
        let store = WatchlistStore::in_memory(20);
        store.add(WatchEntry::bare("A", "chan"), false).unwrap();
        store
            .add(WatchEntry::from_record(record("A", "C-9"), "chan"), true)
            .unwrap();

        let listed = store.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key.cert_number, "C-9");
        assert!(listed[0].last_known.is_some());
    }

    #[test]
    fn capacity_bound_is_enforced() {
        let store = WatchlistStore::in_memory(20);
        for i in 0..20 {
            store
                .add(WatchEntry::bare(&format!("M-{i}"), ""), false)
                .unwrap();
        }

        let err = store.add(WatchEntry::bare("M-20", ""), false).unwrap_err();
        assert!(matches!(err, CertwatchError::CapacityExceeded(20)));
        assert_eq!(store.len(), 20);
    }

    #[test]
    fn replace_snapshot_misses_removed_entry() {
        let store = WatchlistStore::in_memory(20);
        let key = WatchKey::new("A", "C-1");
        assert!(!store.replace_snapshot(&key, None).unwrap());
    }

    #[test]
    fn snapshot_fill_refreshes_key_cert_number() {
        let store = WatchlistStore::in_memory(20);
        store.add(WatchEntry::bare("A", "chan"), false).unwrap();

        let filled = store
            .replace_snapshot(&WatchKey::bare("A"), Some(record("A", "C-7")))
            .unwrap();
        assert!(filled);

        let listed = store.list();
        assert_eq!(listed[0].key.cert_number, "C-7");
        assert_eq!(
            listed[0].last_known.as_ref().map(|r| r.cert_number.as_str()),
            Some("C-7")
        );
    }

    #[test]
    fn filled_bare_entry_reloads_with_matching_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");

        {
            let store = WatchlistStore::load(path.clone(), 20).unwrap();
            store.add(WatchEntry::bare("A", "chan"), false).unwrap();
            store
                .replace_snapshot(&WatchKey::bare("A"), Some(record("A", "C-7")))
                .unwrap();
        }

        let store = WatchlistStore::load(path, 20).unwrap();
        let listed = store.list();
        assert_eq!(listed[0].key.cert_number, "C-7");
        assert_eq!(
            listed[0].key.cert_number,
            listed[0].last_known.as_ref().unwrap().cert_number
        );
    }

    #[test]
    fn insertion_order_is_stable() {
        let store = WatchlistStore::in_memory(20);
        for name in ["C", "A", "B"] {
            store.add(WatchEntry::bare(name, ""), false).unwrap();
        }
        let names: Vec<_> = store.list().into_iter().map(|e| e.key.name).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn concurrent_registers_never_duplicate_a_key() {
        let store = Arc::new(WatchlistStore::in_memory(64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..8 {
                    let _ = store.add(WatchEntry::bare(&format!("M-{i}"), ""), false);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let listed = store.list();
        let mut keys: Vec<_> = listed.iter().map(|e| e.key.clone()).collect();
        keys.sort_by(|a, b| a.name.cmp(&b.name));
        keys.dedup();
        assert_eq!(keys.len(), listed.len());
        assert_eq!(listed.len(), 8);
    }

    #[test]
    fn persists_through_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");

        {
            let store = WatchlistStore::load(path.clone(), 20).unwrap();
            store
                .add(WatchEntry::from_record(record("KTC-K501", "C-1"), "chan"), false)
                .unwrap();
        }

        let store = WatchlistStore::load(path, 20).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains("KTC-K501"));
    }
}
