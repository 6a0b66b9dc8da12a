// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Execution backends.
//!
//! Auction operations are routed to one of two backends depending on the
//! session's network:
//!
//! - [`Network::Local`] → [`DemoBackend`], backed by the local store
//! - [`Network::Remote`] → [`RemoteBackend`], an HTTP node
//!
//! The facade only ever talks to the [`Backend`] union.

pub mod demo;
pub mod remote;

use async_trait::async_trait;

use crate::error::AuctionResult;
use crate::models::{
    Auction, AuctionDraft, AuctionId, BidReceipt, Finalization, Network, WalletAddress, Winner,
};

pub use demo::DemoBackend;
pub use remote::{RemoteBackend, RemoteError};

/// Reachability check for a network's execution environment.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn probe(&self, network: Network) -> AuctionResult<()>;
}

#[derive(Clone)]
pub enum Backend {
    Demo(DemoBackend),
    Remote(RemoteBackend),
}

impl Backend {
    pub fn network(&self) -> Network {
        match self {
            Backend::Demo(_) => Network::Local,
            Backend::Remote(_) => Network::Remote,
        }
    }

    pub async fn create_auction(
        &self,
        draft: &AuctionDraft,
        creator: &WalletAddress,
    ) -> AuctionResult<Auction> {
        match self {
            Backend::Demo(b) => b.create_auction(draft, creator),
            Backend::Remote(b) => b.create_auction(draft, creator).await,
        }
    }

    pub async fn place_bid(
        &self,
        auction_id: AuctionId,
        bidder: &WalletAddress,
        amount: u64,
    ) -> AuctionResult<BidReceipt> {
        match self {
            Backend::Demo(b) => b.place_bid(auction_id, bidder, amount),
            Backend::Remote(b) => b.place_bid(auction_id, bidder, amount).await,
        }
    }

    pub async fn finalize(&self, auction_id: AuctionId) -> AuctionResult<Finalization> {
        match self {
            Backend::Demo(b) => b.finalize(auction_id),
            Backend::Remote(b) => b.finalize(auction_id).await,
        }
    }

    pub async fn get_auction(&self, auction_id: AuctionId) -> AuctionResult<Option<Auction>> {
        match self {
            Backend::Demo(b) => b.get_auction(auction_id),
            Backend::Remote(b) => b.get_auction(auction_id).await,
        }
    }

    pub async fn list_auctions(&self) -> AuctionResult<Vec<Auction>> {
        match self {
            Backend::Demo(b) => b.list_auctions(),
            Backend::Remote(b) => b.list_auctions().await,
        }
    }

    pub async fn winner(&self, auction_id: AuctionId) -> AuctionResult<Option<Winner>> {
        match self {
            Backend::Demo(b) => b.winner(auction_id),
            Backend::Remote(b) => b.winner(auction_id).await,
        }
    }

    /// The local backend is always reachable.
    pub async fn probe(&self) -> AuctionResult<()> {
        match self {
            Backend::Demo(_) => Ok(()),
            Backend::Remote(b) => b.probe().await,
        }
    }
}

/// One backend per network.
#[derive(Clone)]
pub struct BackendRegistry {
    local: Backend,
    remote: Backend,
}

impl BackendRegistry {
    pub fn new(demo: DemoBackend, remote: RemoteBackend) -> Self {
        Self {
            local: Backend::Demo(demo),
            remote: Backend::Remote(remote),
        }
    }

    pub fn select(&self, network: Network) -> &Backend {
        match network {
            Network::Local => &self.local,
            Network::Remote => &self.remote,
        }
    }

    pub fn demo(&self) -> Option<&DemoBackend> {
        match &self.local {
            Backend::Demo(demo) => Some(demo),
            Backend::Remote(_) => None,
        }
    }
}

#[async_trait]
impl NetworkProbe for BackendRegistry {
    async fn probe(&self, network: Network) -> AuctionResult<()> {
        self.select(network).probe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::sealing::PlaintextSealer;
    use crate::storage::KvStore;
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    fn registry(node: &str) -> BackendRegistry {
        let demo = DemoBackend::new(
            Arc::new(KvStore::in_memory()),
            Arc::new(SystemClock),
            Arc::new(PlaintextSealer),
        );
        let remote = RemoteBackend::new(
            &Url::parse(node).unwrap(),
            None,
            Duration::from_millis(200),
        )
        .unwrap();
        BackendRegistry::new(demo, remote)
    }

    #[test]
    fn select_routes_by_network() {
        let registry = registry("http://127.0.0.1:9");
        assert_eq!(registry.select(Network::Local).network(), Network::Local);
        assert_eq!(registry.select(Network::Remote).network(), Network::Remote);
        assert!(registry.demo().is_some());
    }

    #[tokio::test]
    async fn local_probe_always_succeeds() {
        let registry = registry("http://127.0.0.1:9");
        registry.probe(Network::Local).await.unwrap();
    }

    #[tokio::test]
    async fn remote_without_contract_is_unavailable() {
        let registry = registry("http://127.0.0.1:9");
        let err = registry
            .select(Network::Remote)
            .list_auctions()
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "backend_unavailable");
    }
}
