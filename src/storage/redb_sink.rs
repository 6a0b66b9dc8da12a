// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable sink backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `kv`: store key → JSON-encoded value bytes
//!
//! Each [`Change`] batch is written in a single redb write transaction, so a
//! finalization result and the auction deactivation land on disk together
//! or not at all. Audit entries are separate writes and may lag the record
//! they describe.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde_json::Value;

use super::sink::{Change, DurableSink, SinkError};

/// Store key → serialized JSON value.
const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

#[derive(Debug, thiserror::Error)]
pub enum RedbSinkError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<RedbSinkError> for SinkError {
    fn from(e: RedbSinkError) -> Self {
        match e {
            RedbSinkError::Serde(e) => SinkError::Serde(e),
            other => SinkError::Database(other.to_string()),
        }
    }
}

pub struct RedbSink {
    db: Database,
}

impl RedbSink {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, RedbSinkError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create the table so read transactions on a fresh file succeed
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(KV)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn read_all(&self) -> Result<Vec<(String, Value)>, RedbSinkError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV)?;

        let mut entries = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            match serde_json::from_slice::<Value>(value.value()) {
                Ok(parsed) => entries.push((key.value().to_string(), parsed)),
                Err(e) => {
                    tracing::warn!(key = key.value(), error = %e, "Skipping undecodable store entry");
                }
            }
        }
        Ok(entries)
    }

    fn write_batch(&self, changes: &[Change]) -> Result<(), RedbSinkError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV)?;
            for change in changes {
                match &change.value {
                    Some(value) => {
                        let bytes = serde_json::to_vec(value)?;
                        table.insert(change.key.as_str(), bytes.as_slice())?;
                    }
                    None => {
                        table.remove(change.key.as_str())?;
                    }
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl DurableSink for RedbSink {
    fn load_all(&self) -> Result<Vec<(String, Value)>, SinkError> {
        Ok(self.read_all()?)
    }

    fn apply(&self, changes: &[Change]) -> Result<(), SinkError> {
        Ok(self.write_batch(changes)?)
    }
}
