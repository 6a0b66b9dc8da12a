// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Auction Service
//!
//! The facade the UI layer holds. One explicit instance is built by
//! [`AuctionService::bootstrap`] and passed around; there is no global.
//!
//! Every mutation resolves the session address first and fails with
//! [`AuctionError::NotAuthenticated`] before any backend is touched. Calls
//! are routed to the backend of the session's network.

use std::sync::Arc;

use crate::audit_log;
use crate::backend::{Backend, BackendRegistry, DemoBackend, RemoteBackend};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{AuctionError, AuctionResult, FallbackAction};
use crate::models::{
    AppMode, Auction, AuctionDraft, AuctionId, BidReceipt, Finalization, Network, WalletAddress,
    WalletMode, Winner,
};
use crate::sealing::{BidSealer, PlaintextSealer};
use crate::session::{ModeSwitch, NetworkSwitch, Session, SessionManager, WalletCapability};
use crate::storage::{AuditEvent, AuditEventType, AuditRepository, KvStore, RedbSink};

pub struct AuctionService {
    session: SessionManager,
    backends: BackendRegistry,
    store: Arc<KvStore>,
    clock: Arc<dyn Clock>,
}

impl AuctionService {
    /// Open the durable store under `config.data_dir` and restore the
    /// session. A store that cannot be opened degrades to memory only; the
    /// reason is available from [`AuctionService::storage_warnings`].
    pub async fn bootstrap(config: &EngineConfig, wallet: WalletCapability) -> AuctionResult<Self> {
        let path = config.store_path();
        let store = match RedbSink::open(&path) {
            Ok(sink) => {
                tracing::info!(path = %path.display(), "Opened durable store");
                KvStore::open(Arc::new(sink))
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to open durable store; running in memory");
                KvStore::degraded(e.to_string())
            }
        };

        Self::with_parts(
            Arc::new(store),
            Arc::new(SystemClock),
            Arc::new(PlaintextSealer),
            config,
            wallet,
        )
        .await
    }

    /// Assemble the service from explicit parts.
    pub async fn with_parts(
        store: Arc<KvStore>,
        clock: Arc<dyn Clock>,
        sealer: Arc<dyn BidSealer>,
        config: &EngineConfig,
        wallet: WalletCapability,
    ) -> AuctionResult<Self> {
        if let Some(days) = config.audit_retention_days {
            let cutoff = clock.now() - chrono::Duration::days(i64::from(days));
            if let Err(e) = AuditRepository::new(&store).prune_before(cutoff) {
                tracing::warn!(error = %e, "Failed to prune audit events");
            }
        }

        let demo = DemoBackend::new(store.clone(), clock.clone(), sealer);
        if config.seed_demo {
            demo.seed_if_empty()?;
        }

        let remote = RemoteBackend::new(
            &config.remote_node_url,
            config.contract_address.clone(),
            config.probe_timeout,
        )
        .map_err(AuctionError::from)?;
        if !remote.has_contract() {
            tracing::info!(node = remote.node_url(), "No auction contract configured for the remote network");
        }

        let backends = BackendRegistry::new(demo, remote);
        let session =
            SessionManager::hydrate(store.clone(), clock.clone(), Arc::new(backends.clone()), wallet)
                .await?;

        Ok(Self {
            session,
            backends,
            store,
            clock,
        })
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub async fn session(&self) -> Session {
        self.session.snapshot().await
    }

    pub async fn current_address(&self) -> Option<WalletAddress> {
        self.session.current_address().await
    }

    pub async fn connect(
        &self,
        mode: WalletMode,
        credentials: Option<&str>,
    ) -> AuctionResult<WalletAddress> {
        self.session.connect(mode, credentials).await
    }

    pub async fn disconnect(&self) -> AuctionResult<bool> {
        self.session.disconnect().await
    }

    pub async fn switch_network(&self, network: Network) -> AuctionResult<NetworkSwitch> {
        self.session.switch_network(network).await
    }

    pub async fn switch_mode(&self, app_mode: AppMode) -> AuctionResult<ModeSwitch> {
        self.session.switch_mode(app_mode).await
    }

    /// Messages for the user about automatic recoveries at startup.
    pub async fn take_notices(&self) -> Vec<String> {
        self.session.take_notices().await
    }

    /// Writes that only reached memory since the last call.
    pub fn storage_warnings(&self) -> Vec<String> {
        self.store.drain_warnings()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub async fn create_auction(&self, draft: &AuctionDraft) -> AuctionResult<Auction> {
        let (creator, backend) = self.require_address().await?;

        let auction = backend
            .create_auction(draft, &creator)
            .await
            .map_err(|e| enrich(e, backend.network()))?;

        audit_log!(
            &self.store,
            AuditEvent::new(AuditEventType::AuctionCreated, self.clock.now())
                .with_actor(creator.as_str())
                .with_resource("auction", auction.id.to_string())
                .with_details(serde_json::json!({
                    "network": backend.network(),
                    "ends_at": auction.ends_at,
                }))
        );
        Ok(auction)
    }

    /// Place a sealed bid. The auction's window is checked again here
    /// against the current time, then once more atomically by the backend.
    pub async fn place_bid(&self, auction_id: AuctionId, amount: u64) -> AuctionResult<BidReceipt> {
        let (bidder, backend) = self.require_address().await?;
        let network = backend.network();

        let auction = backend
            .get_auction(auction_id)
            .await
            .map_err(|e| enrich(e, network))?
            .ok_or_else(|| AuctionError::NotFound(format!("Auction {auction_id}")))?;
        auction.check_accepting_bids(self.clock.now())?;

        let receipt = backend
            .place_bid(auction_id, &bidder, amount)
            .await
            .map_err(|e| enrich(e, network))?;

        audit_log!(
            &self.store,
            AuditEvent::new(AuditEventType::BidPlaced, self.clock.now())
                .with_actor(bidder.as_str())
                .with_resource("auction", auction_id.to_string())
                .with_details(serde_json::json!({ "bid_id": receipt.bid_id }))
        );
        Ok(receipt)
    }

    pub async fn finalize(&self, auction_id: AuctionId) -> AuctionResult<Finalization> {
        let (caller, backend) = self.require_address().await?;

        let finalization = backend
            .finalize(auction_id)
            .await
            .map_err(|e| enrich(e, backend.network()))?;

        audit_log!(
            &self.store,
            AuditEvent::new(AuditEventType::AuctionFinalized, self.clock.now())
                .with_actor(caller.as_str())
                .with_resource("auction", auction_id.to_string())
                .with_details(serde_json::json!({
                    "has_winner": finalization.result().is_some(),
                }))
        );
        Ok(finalization)
    }

    /// Remove every auction, bid and result from the local store and seed
    /// the demo auctions again. Session flags are kept.
    pub async fn reset_demo_data(&self) -> AuctionResult<usize> {
        let demo = self.local_demo()?;
        let removed = demo.reset()?;
        let seeded = demo.seed_if_empty()?;

        audit_log!(
            &self.store,
            AuditEvent::new(AuditEventType::DemoDataReset, self.clock.now())
                .with_details(serde_json::json!({ "removed": removed, "seeded": seeded }))
        );
        Ok(removed)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_auction(&self, auction_id: AuctionId) -> AuctionResult<Option<Auction>> {
        let backend = self.active_backend().await;
        backend
            .get_auction(auction_id)
            .await
            .map_err(|e| enrich(e, backend.network()))
    }

    /// All auctions on the active network, oldest id first.
    pub async fn list_auctions(&self) -> AuctionResult<Vec<Auction>> {
        let backend = self.active_backend().await;
        let mut auctions = backend
            .list_auctions()
            .await
            .map_err(|e| enrich(e, backend.network()))?;
        auctions.sort_by_key(|a| a.id);
        Ok(auctions)
    }

    pub async fn auction_count(&self) -> AuctionResult<usize> {
        match self.active_backend().await {
            Backend::Demo(demo) => demo.auction_count(),
            Backend::Remote(_) => Ok(self.list_auctions().await?.len()),
        }
    }

    pub async fn winner(&self, auction_id: AuctionId) -> AuctionResult<Option<Winner>> {
        let backend = self.active_backend().await;
        backend
            .winner(auction_id)
            .await
            .map_err(|e| enrich(e, backend.network()))
    }

    /// Whether the connected address won `auction_id`. `false` when nobody
    /// is connected or the auction has no winner yet.
    pub async fn am_i_winner(&self, auction_id: AuctionId) -> AuctionResult<bool> {
        let Some(address) = self.session.current_address().await else {
            return Ok(false);
        };
        Ok(self
            .winner(auction_id)
            .await?
            .is_some_and(|winner| winner.address == address))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn active_backend(&self) -> &Backend {
        self.backends.select(self.session.network().await)
    }

    async fn require_address(&self) -> AuctionResult<(WalletAddress, &Backend)> {
        let session = self.session.snapshot().await;
        let address = session
            .active_address()
            .cloned()
            .ok_or(AuctionError::NotAuthenticated)?;
        Ok((address, self.backends.select(session.network)))
    }

    fn local_demo(&self) -> AuctionResult<&DemoBackend> {
        self.backends
            .demo()
            .ok_or_else(|| AuctionError::backend_unavailable("no local demo backend"))
    }
}

/// Suggest the way out of an unreachable backend.
fn enrich(error: AuctionError, network: Network) -> AuctionError {
    match network {
        Network::Remote => error.with_fallback(FallbackAction::SwitchToLocalNetwork),
        Network::Local => error.with_fallback(FallbackAction::SwitchToDemoMode),
    }
}
