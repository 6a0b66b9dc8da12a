// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auction repository over the key-value store.
//!
//! Auctions live under `auction_{id}`, bids under
//! `bid_{auction_id}_{bidder}_{micros}` (one key per bid, so concurrent
//! bids never overwrite each other), finalization results under
//! `result_{id}`. `micros` is strictly increasing within an auction.
//!
//! Bid placement runs inside [`KvStore::transact`], so the active/deadline
//! checks and the bid write are one atomic step with respect to
//! finalization.

use chrono::{DateTime, Utc};

use super::super::{keys, Durability, KvStore};
use crate::clock::Clock;
use crate::error::{AuctionError, AuctionResult};
use crate::models::{Auction, AuctionDraft, AuctionId, Bid, BidId, FinalizationResult, WalletAddress};
use crate::sealing::BidSealer;

/// Repository for auctions and their sealed bids.
pub struct AuctionRepository<'a> {
    store: &'a KvStore,
    clock: &'a dyn Clock,
    sealer: &'a dyn BidSealer,
}

impl<'a> AuctionRepository<'a> {
    pub fn new(store: &'a KvStore, clock: &'a dyn Clock, sealer: &'a dyn BidSealer) -> Self {
        Self {
            store,
            clock,
            sealer,
        }
    }

    /// Validate `draft` and store a new active auction owned by `creator`.
    ///
    /// The id is the creation time in milliseconds, bumped until it does not
    /// collide with an existing auction.
    pub fn create(&self, draft: &AuctionDraft, creator: &WalletAddress) -> AuctionResult<Auction> {
        draft.validate()?;
        let now = self.clock.now();

        let (auction, durability) = self.store.transact(|tx| {
            let mut id = AuctionId(now.timestamp_millis().max(1) as u64);
            while tx.contains(&keys::auction(id)) {
                id = AuctionId(id.0 + 1);
            }

            let auction = Auction {
                id,
                item_name: draft.item_name.trim().to_string(),
                description: draft.description.trim().to_string(),
                created_at: now,
                ends_at: now + draft.duration(),
                minimum_bid: draft.minimum_bid,
                creator: creator.clone(),
                active: true,
            };
            tx.set(&keys::auction(id), &auction)?;
            Ok::<_, AuctionError>(auction)
        })?;

        note_durability(&durability, "auction");
        tracing::info!(
            auction_id = %auction.id,
            creator = %creator,
            ends_at = %auction.ends_at,
            "Auction created"
        );
        Ok(auction)
    }

    pub fn get(&self, auction_id: AuctionId) -> AuctionResult<Option<Auction>> {
        Ok(self.store.get(&keys::auction(auction_id))?)
    }

    /// All auctions, active and inactive.
    pub fn list(&self) -> AuctionResult<Vec<Auction>> {
        Ok(self.store.scan_prefix(keys::AUCTION_PREFIX)?)
    }

    pub fn count(&self) -> AuctionResult<usize> {
        Ok(self.store.keys_with_prefix(keys::AUCTION_PREFIX)?.len())
    }

    /// Seal and append a bid.
    ///
    /// Checks run in order: the auction exists, is active, has not reached
    /// its deadline, and `amount` meets the minimum. A rejected bid leaves no
    /// record.
    pub fn record_bid(
        &self,
        auction_id: AuctionId,
        bidder: &WalletAddress,
        amount: u64,
    ) -> AuctionResult<Bid> {
        let now = self.clock.now();

        let (bid, durability) = self.store.transact(|tx| {
            let auction: Auction = tx
                .get(&keys::auction(auction_id))?
                .ok_or_else(|| AuctionError::NotFound(format!("Auction {auction_id}")))?;

            auction.check_accepting_bids(now)?;
            if amount < auction.minimum_bid {
                return Err(AuctionError::BidTooLow {
                    minimum: auction.minimum_bid,
                });
            }

            let sealed = self.sealer.seal(amount)?;

            // Placement times are strictly increasing per auction, so bids
            // landing in the same microsecond still rank by arrival
            let latest = tx
                .scan_prefix::<Bid>(&keys::bids_of(auction_id))?
                .iter()
                .map(|b| b.placed_at.timestamp_micros())
                .max();
            let micros = match latest {
                Some(latest) => now.timestamp_micros().max(latest + 1),
                None => now.timestamp_micros(),
            };

            let bid = Bid {
                id: BidId(format!(
                    "{auction_id}_{}",
                    keys::bid_suffix(bidder, micros)
                )),
                auction_id,
                bidder: bidder.clone(),
                amount: sealed,
                placed_at: DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or(now),
                sealed: true,
            };
            tx.set(&keys::bid(auction_id, bidder, micros), &bid)?;
            Ok(bid)
        })?;

        note_durability(&durability, "bid");
        tracing::info!(
            auction_id = %auction_id,
            bid_id = %bid.id,
            bidder = %bidder,
            "Sealed bid recorded"
        );
        Ok(bid)
    }

    /// Every bid of one auction. Amounts stay sealed; not exposed publicly.
    pub(crate) fn list_bids(&self, auction_id: AuctionId) -> AuctionResult<Vec<Bid>> {
        Ok(self.store.scan_prefix(&keys::bids_of(auction_id))?)
    }

    pub fn bid_count(&self, auction_id: AuctionId) -> AuctionResult<usize> {
        Ok(self
            .store
            .keys_with_prefix(&keys::bids_of(auction_id))?
            .len())
    }

    pub fn get_result(&self, auction_id: AuctionId) -> AuctionResult<Option<FinalizationResult>> {
        Ok(self.store.get(&keys::result(auction_id))?)
    }

    /// Store a fully-formed auction as is, without validation or id
    /// assignment. Used for demo fixtures only.
    pub(crate) fn insert_fixture(&self, auction: &Auction) -> AuctionResult<()> {
        let durability = self.store.set(&keys::auction(auction.id), auction)?;
        note_durability(&durability, "auction");
        Ok(())
    }

    /// Remove every auction, bid and result record. Returns how many
    /// records were removed.
    pub fn clear_all(&self) -> AuctionResult<usize> {
        let mut doomed = Vec::new();
        for prefix in [keys::AUCTION_PREFIX, keys::BID_PREFIX, keys::RESULT_PREFIX] {
            doomed.extend(self.store.keys_with_prefix(prefix)?);
        }

        let (removed, durability) = self.store.transact::<_, AuctionError, _>(|tx| {
            for key in &doomed {
                tx.remove(key);
            }
            Ok(doomed.len())
        })?;
        note_durability(&durability, "auction data reset");
        Ok(removed)
    }
}

/// Memory-only writes are already queued as store warnings; just trace them here.
fn note_durability(durability: &Durability, what: &str) {
    if let Durability::MemoryOnly { reason } = durability {
        tracing::warn!(record = what, %reason, "Record kept in memory only");
    }
}
