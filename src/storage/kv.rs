// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persistent key-value store.
//!
//! An in-memory map is the source of truth for the running process; every
//! write is mirrored to a pluggable [`DurableSink`]. A failed durable write
//! never rolls back or corrupts the in-memory view: it is reported as
//! [`Durability::MemoryOnly`], logged, and queued for
//! [`KvStore::drain_warnings`].
//!
//! Multi-key updates go through [`KvStore::transact`], which runs the closure
//! under the write lock with staged writes. Reads inside the closure see the
//! staged writes; if the closure fails nothing is applied. This is the
//! compare-and-set primitive the auction repository relies on.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::sink::{Change, DurableSink, MemorySink, UnavailableSink};
use crate::error::AuctionError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("serialization error for `{key}`: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for AuctionError {
    fn from(e: StoreError) -> Self {
        AuctionError::Storage(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of mirroring a write to the durable sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Durability {
    Durable,
    MemoryOnly { reason: String },
}

impl Durability {
    pub fn is_durable(&self) -> bool {
        matches!(self, Durability::Durable)
    }
}

/// Staged view handed to [`KvStore::transact`] closures.
pub struct Transaction<'a> {
    committed: &'a BTreeMap<String, Value>,
    staged: BTreeMap<String, Option<Value>>,
}

impl Transaction<'_> {
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.raw(key) {
            Some(value) => decode(key, value.clone()).map(Some),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> StoreResult<()> {
        let value = encode(key, value)?;
        self.staged.insert(key.to_string(), Some(value));
        Ok(())
    }

    pub fn remove(&mut self, key: &str) {
        self.staged.insert(key.to_string(), None);
    }

    /// Values under `prefix`, staged writes included, one per key.
    pub fn scan_prefix<T: DeserializeOwned>(&self, prefix: &str) -> StoreResult<Vec<T>> {
        let mut merged: BTreeMap<&str, &Value> = self
            .committed
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), v))
            .collect();

        for (key, value) in self.staged.iter().filter(|(k, _)| k.starts_with(prefix)) {
            match value {
                Some(v) => {
                    merged.insert(key.as_str(), v);
                }
                None => {
                    merged.remove(key.as_str());
                }
            }
        }

        merged
            .into_iter()
            .map(|(key, value)| decode(key, value.clone()))
            .collect()
    }

    fn raw(&self, key: &str) -> Option<&Value> {
        match self.staged.get(key) {
            Some(staged) => staged.as_ref(),
            None => self.committed.get(key),
        }
    }
}

pub struct KvStore {
    entries: RwLock<BTreeMap<String, Value>>,
    sink: Arc<dyn DurableSink>,
    warnings: Mutex<Vec<String>>,
}

impl KvStore {
    /// Open a store over `sink`, loading everything it holds.
    ///
    /// An unreadable sink is not fatal: the store starts empty and a
    /// warning is queued.
    pub fn open(sink: Arc<dyn DurableSink>) -> Self {
        let store = Self {
            entries: RwLock::new(BTreeMap::new()),
            sink,
            warnings: Mutex::new(Vec::new()),
        };

        match store.sink.load_all() {
            Ok(loaded) => {
                if let Ok(mut entries) = store.entries.write() {
                    entries.extend(loaded);
                }
            }
            Err(e) => store.push_warning(format!("failed to load durable store: {e}")),
        }
        store
    }

    /// Store with a fresh, unshared memory sink.
    pub fn in_memory() -> Self {
        Self::open(Arc::new(MemorySink::new()))
    }

    /// Memory-only store for when the durable medium cannot be opened.
    /// Every write reports [`Durability::MemoryOnly`].
    pub fn degraded(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let store = Self::open(Arc::new(UnavailableSink::new(reason.clone())));
        store.push_warning(format!("durable store unavailable: {reason}"));
        store
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        match entries.get(key) {
            Some(value) => decode(key, value.clone()).map(Some),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<Durability> {
        let (_, durability) = self.transact(|tx| tx.set(key, value))?;
        Ok(durability)
    }

    pub fn remove(&self, key: &str) -> StoreResult<Durability> {
        let (_, durability) = self.transact::<_, StoreError, _>(|tx| {
            tx.remove(key);
            Ok(())
        })?;
        Ok(durability)
    }

    /// Remove every key under `prefix`. Returns how many were removed.
    pub fn clear_prefix(&self, prefix: &str) -> StoreResult<(usize, Durability)> {
        let keys = self.keys_with_prefix(prefix)?;
        self.transact::<_, StoreError, _>(|tx| {
            for key in &keys {
                tx.remove(key);
            }
            Ok(keys.len())
        })
    }

    pub fn scan_prefix<T: DeserializeOwned>(&self, prefix: &str) -> StoreResult<Vec<T>> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(key, value)| decode(key, value.clone()))
            .collect()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    /// Run `f` atomically against a staged view of the store.
    ///
    /// On `Ok` the staged writes become visible in memory and are then
    /// handed to the sink as one batch. On `Err` nothing changes.
    pub fn transact<R, E, F>(&self, f: F) -> Result<(R, Durability), E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;

        let mut tx = Transaction {
            committed: &*entries,
            staged: BTreeMap::new(),
        };
        let output = f(&mut tx)?;
        let staged = tx.staged;

        if staged.is_empty() {
            return Ok((output, Durability::Durable));
        }

        let changes: Vec<Change> = staged
            .into_iter()
            .map(|(key, value)| Change { key, value })
            .collect();

        for change in &changes {
            match &change.value {
                Some(value) => {
                    entries.insert(change.key.clone(), value.clone());
                }
                None => {
                    entries.remove(&change.key);
                }
            }
        }

        // Persist while still holding the lock so sink order matches memory order
        let durability = match self.sink.apply(&changes) {
            Ok(()) => Durability::Durable,
            Err(e) => {
                let reason = format!("durable write failed: {e}");
                self.push_warning(reason.clone());
                Durability::MemoryOnly { reason }
            }
        };
        drop(entries);

        Ok((output, durability))
    }

    /// Take all queued durability warnings.
    pub fn drain_warnings(&self) -> Vec<String> {
        match self.warnings.lock() {
            Ok(mut warnings) => std::mem::take(&mut *warnings),
            Err(_) => Vec::new(),
        }
    }

    fn push_warning(&self, message: String) {
        tracing::warn!(warning = %message, "Store persistence degraded to memory only");
        if let Ok(mut warnings) = self.warnings.lock() {
            warnings.push(message);
        }
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|source| StoreError::Serialization {
        key: key.to_string(),
        source,
    })
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> StoreResult<T> {
    serde_json::from_value(value).map_err(|source| StoreError::Serialization {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Record {
        id: u32,
        label: String,
    }

    fn record(id: u32) -> Record {
        Record {
            id,
            label: format!("r{id}"),
        }
    }

    #[test]
    fn set_is_immediately_visible() {
        let store = KvStore::in_memory();
        assert!(store.get::<Record>("item_1").unwrap().is_none());

        let durability = store.set("item_1", &record(1)).unwrap();
        assert!(durability.is_durable());
        assert_eq!(store.get::<Record>("item_1").unwrap(), Some(record(1)));
        assert!(store.contains("item_1"));
    }

    #[test]
    fn scan_prefix_matches_only_prefix() {
        let store = KvStore::in_memory();
        store.set("item_1", &record(1)).unwrap();
        store.set("item_2", &record(2)).unwrap();
        store.set("items", &record(99)).unwrap();
        store.set("other_3", &record(3)).unwrap();

        let mut found: Vec<Record> = store.scan_prefix("item_").unwrap();
        found.sort_by_key(|r| r.id);
        assert_eq!(found, vec![record(1), record(2)]);
    }

    #[test]
    fn reopen_over_same_sink_restores_entries() {
        let sink = MemorySink::new();
        {
            let store = KvStore::open(Arc::new(sink.clone()));
            store.set("item_1", &record(1)).unwrap();
            store.set("item_2", &record(2)).unwrap();
            store.remove("item_2").unwrap();
        }

        let reopened = KvStore::open(Arc::new(sink));
        assert_eq!(reopened.get::<Record>("item_1").unwrap(), Some(record(1)));
        assert!(!reopened.contains("item_2"));
    }

    #[test]
    fn failing_sink_keeps_memory_and_queues_warning() {
        let store = KvStore::open(Arc::new(UnavailableSink::new("disk full")));

        let durability = store.set("item_1", &record(1)).unwrap();
        assert!(matches!(durability, Durability::MemoryOnly { .. }));
        assert_eq!(store.get::<Record>("item_1").unwrap(), Some(record(1)));

        let warnings = store.drain_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("disk full"));
        assert!(store.drain_warnings().is_empty());
    }

    #[test]
    fn failed_transaction_applies_nothing() {
        let store = KvStore::in_memory();
        store.set("item_1", &record(1)).unwrap();

        let result: Result<((), Durability), AuctionError> = store.transact(|tx| {
            tx.set("item_2", &record(2))?;
            tx.remove("item_1");
            Err(AuctionError::Validation("abort".to_string()))
        });
        assert!(result.is_err());

        assert!(store.contains("item_1"));
        assert!(!store.contains("item_2"));
    }

    #[test]
    fn transaction_reads_see_staged_writes() {
        let store = KvStore::in_memory();
        store.set("item_1", &record(1)).unwrap();

        let (seen, _) = store
            .transact::<_, StoreError, _>(|tx| {
                tx.set("item_2", &record(2))?;
                tx.remove("item_1");
                let scanned: Vec<Record> = tx.scan_prefix("item_")?;
                Ok((scanned, tx.contains("item_1"), tx.get::<Record>("item_2")?))
            })
            .unwrap();

        assert_eq!(seen.0, vec![record(2)]);
        assert!(!seen.1);
        assert_eq!(seen.2, Some(record(2)));
    }

    #[test]
    fn clear_prefix_removes_matching_keys() {
        let store = KvStore::in_memory();
        store.set("bid_1", &record(1)).unwrap();
        store.set("bid_2", &record(2)).unwrap();
        store.set("auction_1", &record(3)).unwrap();

        let (removed, durability) = store.clear_prefix("bid_").unwrap();
        assert_eq!(removed, 2);
        assert!(durability.is_durable());
        assert!(store.keys_with_prefix("bid_").unwrap().is_empty());
        assert!(store.contains("auction_1"));
    }

    #[test]
    fn decoding_wrong_shape_reports_key() {
        let store = KvStore::in_memory();
        store.set("item_1", &"not a record").unwrap();

        let err = store.get::<Record>("item_1").unwrap_err();
        assert!(err.to_string().contains("item_1"));
    }

    #[test]
    fn degraded_store_works_in_memory_and_warns() {
        let store = KvStore::degraded("permission denied");
        assert_eq!(
            store.drain_warnings(),
            vec!["durable store unavailable: permission denied".to_string()]
        );

        let durability = store.set("k", &1u32).unwrap();
        assert!(!durability.is_durable());
        assert_eq!(store.get::<u32>("k").unwrap(), Some(1));
        assert_eq!(store.drain_warnings().len(), 1);
    }
}
