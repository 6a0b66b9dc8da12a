// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit trail for auction lifecycle and session events.
//!
//! Events are stored under `audit_` keys in the persistent store. Bid
//! amounts are never recorded: a bid event names the bidder and auction
//! only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{keys, KvStore, StoreError, StoreResult};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Auction events
    AuctionCreated,
    BidPlaced,
    AuctionFinalized,
    DemoDataReset,

    // Session events
    SessionConnected,
    SessionDisconnected,
    ConnectionRejected,
    ModeSwitched,
    NetworkSwitched,
    NetworkFallback,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Wallet address that triggered the event (if known).
    pub actor: Option<String>,
    /// Resource affected (auction id, wallet mode, ...).
    pub resource_id: Option<String>,
    /// Resource type (auction, session, ...).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Event stamped with `timestamp`, taken from the engine's clock.
    pub fn new(event_type: AuditEventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            event_type,
            actor: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    fn key(&self) -> String {
        keys::audit(self.timestamp.timestamp_micros(), &self.event_id)
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    store: &'a KvStore,
}

impl<'a> AuditRepository<'a> {
    pub fn new(store: &'a KvStore) -> Self {
        Self { store }
    }

    /// Append an event.
    pub fn log(&self, event: &AuditEvent) -> StoreResult<()> {
        let durability = self.store.set(&event.key(), event)?;
        if !durability.is_durable() {
            tracing::debug!(event_id = %event.event_id, "Audit event held in memory only");
        }
        Ok(())
    }

    /// Remove events stamped before `cutoff`. Returns how many were removed.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        // Keys sort chronologically, so everything below the cutoff key is older
        let boundary = keys::audit(cutoff.timestamp_micros(), "");
        let expired: Vec<String> = self
            .store
            .keys_with_prefix(keys::AUDIT_PREFIX)?
            .into_iter()
            .filter(|key| key.as_str() < boundary.as_str())
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }

        let (removed, _) = self.store.transact::<_, StoreError, _>(|tx| {
            for key in &expired {
                tx.remove(key);
            }
            Ok(expired.len())
        })?;
        tracing::info!(removed, cutoff = %cutoff, "Pruned audit events");
        Ok(removed)
    }

    /// All events, oldest first.
    pub fn read_events(&self) -> StoreResult<Vec<AuditEvent>> {
        self.store.scan_prefix(keys::AUDIT_PREFIX)
    }

    /// Events triggered by one wallet address.
    pub fn search_by_actor(&self, actor: &str) -> StoreResult<Vec<AuditEvent>> {
        Ok(self
            .read_events()?
            .into_iter()
            .filter(|e| e.actor.as_deref() == Some(actor))
            .collect())
    }

    /// Events touching one resource.
    pub fn search_by_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> StoreResult<Vec<AuditEvent>> {
        Ok(self
            .read_events()?
            .into_iter()
            .filter(|e| {
                e.resource_type.as_deref() == Some(resource_type)
                    && e.resource_id.as_deref() == Some(resource_id)
            })
            .collect())
    }
}

/// Record an audit event; failures are logged and never propagate.
///
/// ```rust,ignore
/// audit_log!(&store, AuditEvent::new(AuditEventType::AuctionCreated, clock.now()).with_actor(addr));
/// ```
#[macro_export]
macro_rules! audit_log {
    ($store:expr, $event:expr) => {{
        let repo = $crate::storage::AuditRepository::new($store);
        if let Err(e) = repo.log(&$event) {
            tracing::warn!(error = %e, "Failed to record audit event");
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn events_read_back_in_time_order() {
        let store = KvStore::in_memory();
        let repo = AuditRepository::new(&store);
        let base = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();

        let later = AuditEvent::new(AuditEventType::BidPlaced, base + Duration::seconds(5));
        let earlier = AuditEvent::new(AuditEventType::AuctionCreated, base);
        repo.log(&later).unwrap();
        repo.log(&earlier).unwrap();

        let events = repo.read_events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::AuctionCreated);
        assert_eq!(events[1].event_type, AuditEventType::BidPlaced);
    }

    #[test]
    fn search_filters_by_actor_and_resource() {
        let store = KvStore::in_memory();
        let repo = AuditRepository::new(&store);

        repo.log(
            &AuditEvent::new(AuditEventType::BidPlaced, Utc::now())
                .with_actor("0xaaa")
                .with_resource("auction", "1"),
        )
        .unwrap();
        repo.log(
            &AuditEvent::new(AuditEventType::BidPlaced, Utc::now())
                .with_actor("0xbbb")
                .with_resource("auction", "2"),
        )
        .unwrap();

        assert_eq!(repo.search_by_actor("0xaaa").unwrap().len(), 1);
        assert_eq!(repo.search_by_resource("auction", "2").unwrap().len(), 1);
        assert!(repo.search_by_resource("auction", "3").unwrap().is_empty());
    }

    #[test]
    fn failed_marks_event() {
        let event = AuditEvent::new(AuditEventType::ConnectionRejected, Utc::now()).failed("user declined");
        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("user declined"));
    }

    #[test]
    fn macro_logs_event() {
        let store = KvStore::in_memory();
        audit_log!(
            &store,
            AuditEvent::new(AuditEventType::SessionConnected, Utc::now()).with_actor("0xabc")
        );
        let events = AuditRepository::new(&store).read_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor.as_deref(), Some("0xabc"));
    }

    #[test]
    fn prune_removes_only_older_events() {
        let store = KvStore::in_memory();
        let repo = AuditRepository::new(&store);
        let base = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();

        repo.log(&AuditEvent::new(AuditEventType::AuctionCreated, base - Duration::days(40)))
            .unwrap();
        repo.log(&AuditEvent::new(AuditEventType::BidPlaced, base - Duration::days(30)))
            .unwrap();
        repo.log(&AuditEvent::new(AuditEventType::AuctionFinalized, base)).unwrap();
        store.set("auction_1", &1u32).unwrap();

        assert_eq!(repo.prune_before(base - Duration::days(30)).unwrap(), 1);
        let kept: Vec<_> = repo
            .read_events()
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            kept,
            vec![AuditEventType::BidPlaced, AuditEventType::AuctionFinalized]
        );
        assert!(store.contains("auction_1"));
        assert_eq!(repo.prune_before(base - Duration::days(30)).unwrap(), 0);
    }
}
