// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable media behind the key-value store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// One staged write: `Some` upserts, `None` deletes.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub key: String,
    pub value: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(String),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Durable medium. `apply` receives a whole transaction's changes at once.
pub trait DurableSink: Send + Sync {
    fn load_all(&self) -> Result<Vec<(String, Value)>, SinkError>;

    fn apply(&self, changes: &[Change]) -> Result<(), SinkError>;
}

/// Process-local sink. Clones share the same map, so a test can drop a
/// store and reopen another over the same contents to simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DurableSink for MemorySink {
    fn load_all(&self) -> Result<Vec<(String, Value)>, SinkError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| SinkError::Unavailable("memory sink lock poisoned".to_string()))?;
        Ok(entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn apply(&self, changes: &[Change]) -> Result<(), SinkError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SinkError::Unavailable("memory sink lock poisoned".to_string()))?;
        for change in changes {
            match &change.value {
                Some(value) => {
                    entries.insert(change.key.clone(), value.clone());
                }
                None => {
                    entries.remove(&change.key);
                }
            }
        }
        Ok(())
    }
}

/// Stand-in for a durable medium that could not be opened. Loads nothing
/// and refuses every write, so each write is reported as memory-only.
#[derive(Debug, Clone)]
pub struct UnavailableSink {
    reason: String,
}

impl UnavailableSink {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl DurableSink for UnavailableSink {
    fn load_all(&self) -> Result<Vec<(String, Value)>, SinkError> {
        Ok(Vec::new())
    }

    fn apply(&self, _changes: &[Change]) -> Result<(), SinkError> {
        Err(SinkError::Unavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_contents() {
        let sink = MemorySink::new();
        let other = sink.clone();

        sink.apply(&[Change {
            key: "a".to_string(),
            value: Some(json!(1)),
        }])
        .unwrap();

        assert_eq!(other.load_all().unwrap(), vec![("a".to_string(), json!(1))]);

        other
            .apply(&[Change {
                key: "a".to_string(),
                value: None,
            }])
            .unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn unavailable_sink_refuses_writes() {
        let sink = UnavailableSink::new("disk full");
        assert!(sink.load_all().unwrap().is_empty());
        let err = sink.apply(&[]).unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }
}
