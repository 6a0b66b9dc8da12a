// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Store-backed execution backend used on the local network.

use std::sync::Arc;

use chrono::Duration;

use crate::clock::Clock;
use crate::error::AuctionResult;
use crate::models::{
    Auction, AuctionDraft, AuctionId, BidReceipt, Finalization, WalletAddress, Winner,
};
use crate::resolution::ResolutionEngine;
use crate::sealing::BidSealer;
use crate::storage::{AuctionRepository, KvStore};

/// Demo auction laid out relative to the seeding instant.
struct DemoFixture {
    id: u64,
    item_name: &'static str,
    description: &'static str,
    started_hours_ago: i64,
    ends_in_minutes: i64,
    minimum_bid: u64,
    creator: &'static str,
    active: bool,
}

const DEMO_AUCTIONS: [DemoFixture; 3] = [
    DemoFixture {
        id: 1,
        item_name: "Rare Vintage Painting",
        description: "Original painting from the 1950s in excellent condition",
        started_hours_ago: 1,
        ends_in_minutes: 60,
        minimum_bid: 1000,
        creator: "0x1234567890123456789012345678901234567890",
        active: true,
    },
    DemoFixture {
        id: 2,
        item_name: "Collectible Rolex Watch",
        description: "Vintage Rolex Submariner from 1970",
        started_hours_ago: 2,
        ends_in_minutes: 30,
        minimum_bid: 5000,
        creator: "0xabcdefabcdefabcdefabcdefabcdefabcdefabcdef",
        active: true,
    },
    // Already closed, never bid on
    DemoFixture {
        id: 3,
        item_name: "First Edition Book",
        description: "First edition of \"War and Peace\" by L.N. Tolstoy",
        started_hours_ago: 3,
        ends_in_minutes: -30,
        minimum_bid: 2000,
        creator: "0x9999999999999999999999999999999999999999",
        active: false,
    },
];

#[derive(Clone)]
pub struct DemoBackend {
    store: Arc<KvStore>,
    clock: Arc<dyn Clock>,
    sealer: Arc<dyn BidSealer>,
}

impl DemoBackend {
    pub fn new(store: Arc<KvStore>, clock: Arc<dyn Clock>, sealer: Arc<dyn BidSealer>) -> Self {
        Self {
            store,
            clock,
            sealer,
        }
    }

    fn repo(&self) -> AuctionRepository<'_> {
        AuctionRepository::new(&self.store, self.clock.as_ref(), self.sealer.as_ref())
    }

    fn engine(&self) -> ResolutionEngine<'_> {
        ResolutionEngine::new(&self.store, self.clock.as_ref(), self.sealer.as_ref())
    }

    pub fn create_auction(
        &self,
        draft: &AuctionDraft,
        creator: &WalletAddress,
    ) -> AuctionResult<Auction> {
        self.repo().create(draft, creator)
    }

    pub fn place_bid(
        &self,
        auction_id: AuctionId,
        bidder: &WalletAddress,
        amount: u64,
    ) -> AuctionResult<BidReceipt> {
        let bid = self.repo().record_bid(auction_id, bidder, amount)?;
        Ok(BidReceipt::from(&bid))
    }

    pub fn finalize(&self, auction_id: AuctionId) -> AuctionResult<Finalization> {
        self.engine().finalize(auction_id)
    }

    pub fn get_auction(&self, auction_id: AuctionId) -> AuctionResult<Option<Auction>> {
        self.repo().get(auction_id)
    }

    pub fn list_auctions(&self) -> AuctionResult<Vec<Auction>> {
        self.repo().list()
    }

    pub fn auction_count(&self) -> AuctionResult<usize> {
        self.repo().count()
    }

    pub fn winner(&self, auction_id: AuctionId) -> AuctionResult<Option<Winner>> {
        Ok(self
            .repo()
            .get_result(auction_id)?
            .as_ref()
            .map(Winner::from))
    }

    /// Insert the demo auctions when the store holds none. Returns how many
    /// were created.
    pub fn seed_if_empty(&self) -> AuctionResult<usize> {
        let repo = self.repo();
        if repo.count()? > 0 {
            return Ok(0);
        }

        let now = self.clock.now();
        for fixture in &DEMO_AUCTIONS {
            repo.insert_fixture(&Auction {
                id: AuctionId(fixture.id),
                item_name: fixture.item_name.to_string(),
                description: fixture.description.to_string(),
                created_at: now - Duration::hours(fixture.started_hours_ago),
                ends_at: now + Duration::minutes(fixture.ends_in_minutes),
                minimum_bid: fixture.minimum_bid,
                creator: WalletAddress::from(fixture.creator),
                active: fixture.active,
            })?;
        }

        tracing::info!(count = DEMO_AUCTIONS.len(), "Seeded demo auctions");
        Ok(DEMO_AUCTIONS.len())
    }

    /// Remove every auction, bid and result. Session flags are untouched.
    pub fn reset(&self) -> AuctionResult<usize> {
        let removed = self.repo().clear_all()?;
        tracing::info!(removed, "Demo auction data cleared");
        Ok(removed)
    }
}
