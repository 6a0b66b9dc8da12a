// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistent Storage Module
//!
//! A string-keyed store of JSON values that survives process restarts.
//!
//! ## Model
//!
//! - The in-memory map inside [`KvStore`] is authoritative for the running
//!   process; every write is visible immediately.
//! - Every committed write is mirrored to a [`DurableSink`]. The production
//!   sink is [`RedbSink`], a single redb file under the data directory.
//! - A failing sink degrades the store to memory-only for that write; the
//!   failure is reported, never fatal.
//!
//! ## Key Layout
//!
//! See [`keys`]. Session flag names are shared with the UI and are part of
//! the compatibility surface.

pub mod audit;
pub mod keys;
pub mod kv;
pub mod redb_sink;
pub mod repository;
pub mod sink;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use kv::{Durability, KvStore, StoreError, StoreResult, Transaction};
pub use redb_sink::{RedbSink, RedbSinkError};
pub use repository::AuctionRepository;
pub use sink::{Change, DurableSink, MemorySink, SinkError, UnavailableSink};
