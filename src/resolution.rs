// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sealed-bid resolution.
//!
//! Finalization runs as one store transaction: the auction is re-read, its
//! bids are re-scanned and the result plus the deactivated auction are
//! written together. Bid placement uses the same transaction primitive, so
//! a bid either lands before finalization saw the bid set or is rejected as
//! closed afterwards.
//!
//! ## Winner Selection
//!
//! Highest amount wins. Equal amounts go to the earliest `placed_at`; equal
//! timestamps (distinct bidders in the same microsecond) fall back to the
//! bid id so the outcome never depends on scan order.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::{AuctionError, AuctionResult};
use crate::models::{Auction, AuctionId, Bid, Finalization, FinalizationResult};
use crate::sealing::BidSealer;
use crate::storage::{keys, KvStore};

/// A bid with its amount opened for comparison.
#[derive(Debug)]
struct OpenedBid<'a> {
    bid: &'a Bid,
    amount: u64,
}

pub struct ResolutionEngine<'a> {
    store: &'a KvStore,
    clock: &'a dyn Clock,
    sealer: &'a dyn BidSealer,
}

impl<'a> ResolutionEngine<'a> {
    pub fn new(store: &'a KvStore, clock: &'a dyn Clock, sealer: &'a dyn BidSealer) -> Self {
        Self {
            store,
            clock,
            sealer,
        }
    }

    /// Close an auction and publish its winner.
    ///
    /// Fails with `NotFound` for unknown ids and `TooEarly` before the
    /// deadline. Finalizing an already-inactive auction returns the stored
    /// outcome unchanged.
    pub fn finalize(&self, auction_id: AuctionId) -> AuctionResult<Finalization> {
        let now = self.clock.now();

        let ((outcome, newly_finalized), durability) = self.store.transact(|tx| {
            let mut auction: Auction = tx
                .get(&keys::auction(auction_id))?
                .ok_or_else(|| AuctionError::NotFound(format!("Auction {auction_id}")))?;

            if now < auction.ends_at {
                return Err(AuctionError::TooEarly { auction_id });
            }

            if !auction.active {
                let existing = match tx.get::<FinalizationResult>(&keys::result(auction_id))? {
                    Some(result) => Finalization::Winner(result),
                    None => Finalization::NoBids { auction_id },
                };
                return Ok((existing, false));
            }

            let bids: Vec<Bid> = tx.scan_prefix(&keys::bids_of(auction_id))?;

            auction.active = false;
            tx.set(&keys::auction(auction_id), &auction)?;

            let outcome = match self.resolve(&bids, now)? {
                Some(result) => {
                    tx.set(&keys::result(auction_id), &result)?;
                    Finalization::Winner(result)
                }
                None => Finalization::NoBids { auction_id },
            };
            Ok::<_, AuctionError>((outcome, true))
        })?;

        if !durability.is_durable() {
            tracing::warn!(auction_id = %auction_id, "Finalization kept in memory only");
        }

        if newly_finalized {
            match &outcome {
                Finalization::Winner(result) => tracing::info!(
                    auction_id = %auction_id,
                    winner = %result.winner,
                    bid_count = result.bid_count,
                    "Auction finalized"
                ),
                Finalization::NoBids { .. } => {
                    tracing::info!(auction_id = %auction_id, "Auction closed without bids")
                }
            }
        } else {
            tracing::debug!(auction_id = %auction_id, "Auction already finalized");
        }

        Ok(outcome)
    }

    fn resolve(
        &self,
        bids: &[Bid],
        finalized_at: DateTime<Utc>,
    ) -> AuctionResult<Option<FinalizationResult>> {
        let opened = bids
            .iter()
            .map(|bid| {
                Ok(OpenedBid {
                    bid,
                    amount: self.sealer.open(&bid.amount)?,
                })
            })
            .collect::<AuctionResult<Vec<_>>>()?;

        Ok(select_winner(&opened).map(|winner| FinalizationResult {
            auction_id: winner.bid.auction_id,
            winner: winner.bid.bidder.clone(),
            winning_amount: winner.amount,
            bid_count: bids.len(),
            finalized_at,
        }))
    }
}

fn select_winner<'b, 'a>(bids: &'b [OpenedBid<'a>]) -> Option<&'b OpenedBid<'a>> {
    bids.iter().min_by(|a, b| rank(a, b))
}

/// `Less` means `a` beats `b`.
fn rank(a: &OpenedBid<'_>, b: &OpenedBid<'_>) -> Ordering {
    b.amount
        .cmp(&a.amount)
        .then_with(|| a.bid.placed_at.cmp(&b.bid.placed_at))
        .then_with(|| a.bid.id.cmp(&b.bid.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ClosedReason;
    use crate::models::{AuctionDraft, BidId, WalletAddress};
    use crate::sealing::PlaintextSealer;
    use crate::storage::{AuctionRepository, Change, DurableSink, SinkError};
    use chrono::{Duration, TimeZone};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
    }

    fn addr(s: &str) -> WalletAddress {
        WalletAddress::from(s)
    }

    struct Fixture {
        store: KvStore,
        clock: ManualClock,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: KvStore::in_memory(),
                clock: ManualClock::new(start()),
            }
        }

        fn repo(&self) -> AuctionRepository<'_> {
            AuctionRepository::new(&self.store, &self.clock, &PlaintextSealer)
        }

        fn engine(&self) -> ResolutionEngine<'_> {
            ResolutionEngine::new(&self.store, &self.clock, &PlaintextSealer)
        }

        fn auction(&self, minimum_bid: u64) -> Auction {
            self.repo()
                .create(
                    &AuctionDraft::new("Vase", "Blue and white", 1.0, minimum_bid),
                    &addr("0xcreator"),
                )
                .unwrap()
        }
    }

    #[test]
    fn vase_scenario_highest_bid_wins() {
        let fx = Fixture::new();
        let auction = fx.auction(100);

        fx.clock.advance(Duration::minutes(1));
        fx.repo().record_bid(auction.id, &addr("0xX"), 150).unwrap();
        fx.clock.advance(Duration::minutes(1));
        fx.repo().record_bid(auction.id, &addr("0xY"), 120).unwrap();

        fx.clock.set(auction.ends_at + Duration::seconds(1));
        let outcome = fx.engine().finalize(auction.id).unwrap();
        let result = outcome.result().unwrap();
        assert_eq!(result.winner, addr("0xX"));
        assert_eq!(result.winning_amount, 150);
        assert_eq!(result.bid_count, 2);

        let stored = fx.repo().get(auction.id).unwrap().unwrap();
        assert!(!stored.active);
        assert_eq!(fx.repo().get_result(auction.id).unwrap().as_ref(), Some(result));
    }

    #[test]
    fn tie_goes_to_earliest_bid() {
        let fx = Fixture::new();
        let auction = fx.auction(50);

        fx.clock.advance(Duration::minutes(1));
        fx.repo().record_bid(auction.id, &addr("0xA"), 100).unwrap();
        // C sorts before B by key, so scan order alone would pick C
        fx.clock.advance(Duration::minutes(1));
        fx.repo().record_bid(auction.id, &addr("0xB"), 150).unwrap();
        fx.clock.advance(Duration::minutes(1));
        fx.repo().record_bid(auction.id, &addr("0x0C"), 150).unwrap();

        fx.clock.set(auction.ends_at);
        let outcome = fx.engine().finalize(auction.id).unwrap();
        let result = outcome.result().unwrap();
        assert_eq!(result.winner, addr("0xB"));
        assert_eq!(result.winning_amount, 150);
        assert_eq!(result.bid_count, 3);
    }

    #[test]
    fn zero_bids_deactivates_without_result() {
        let fx = Fixture::new();
        let auction = fx.auction(100);

        fx.clock.set(auction.ends_at);
        let outcome = fx.engine().finalize(auction.id).unwrap();
        assert_eq!(outcome, Finalization::NoBids { auction_id: auction.id });
        assert!(!fx.repo().get(auction.id).unwrap().unwrap().active);
        assert!(fx.repo().get_result(auction.id).unwrap().is_none());

        // Second call reports the same outcome
        assert_eq!(fx.engine().finalize(auction.id).unwrap(), outcome);
    }

    #[test]
    fn finalize_twice_returns_identical_result() {
        let fx = Fixture::new();
        let auction = fx.auction(100);
        fx.repo().record_bid(auction.id, &addr("0xX"), 300).unwrap();

        fx.clock.set(auction.ends_at);
        let first = fx.engine().finalize(auction.id).unwrap();

        fx.clock.advance(Duration::hours(3));
        let second = fx.engine().finalize(auction.id).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn late_bid_after_finalization_is_rejected() {
        let fx = Fixture::new();
        let auction = fx.auction(100);
        fx.repo().record_bid(auction.id, &addr("0xX"), 300).unwrap();

        fx.clock.set(auction.ends_at);
        let first = fx.engine().finalize(auction.id).unwrap();

        let err = fx
            .repo()
            .record_bid(auction.id, &addr("0xY"), 10_000)
            .unwrap_err();
        assert!(matches!(
            err,
            AuctionError::AuctionClosed {
                reason: ClosedReason::Inactive,
                ..
            }
        ));
        assert_eq!(fx.engine().finalize(auction.id).unwrap(), first);
    }

    #[test]
    fn finalize_before_deadline_is_too_early() {
        let fx = Fixture::new();
        let auction = fx.auction(100);

        fx.clock.set(auction.ends_at - Duration::seconds(1));
        let err = fx.engine().finalize(auction.id).unwrap_err();
        assert_eq!(err, AuctionError::TooEarly { auction_id: auction.id });
        assert!(fx.repo().get(auction.id).unwrap().unwrap().active);
    }

    #[test]
    fn finalize_unknown_auction_is_not_found() {
        let fx = Fixture::new();
        let err = fx.engine().finalize(AuctionId(12345)).unwrap_err();
        assert!(matches!(err, AuctionError::NotFound(_)));
    }

    #[test]
    fn same_instant_bids_rank_by_arrival() {
        let fx = Fixture::new();
        let auction = fx.auction(10);
        let first = fx.repo().record_bid(auction.id, &addr("0xbbb"), 40).unwrap();
        let second = fx.repo().record_bid(auction.id, &addr("0xaaa"), 40).unwrap();
        assert!(first.placed_at < second.placed_at);

        fx.clock.set(auction.ends_at);
        let outcome = fx.engine().finalize(auction.id).unwrap();
        assert_eq!(outcome.result().unwrap().winner, addr("0xbbb"));
    }

    #[test]
    fn equal_amount_and_time_fall_back_to_bid_id() {
        let bid = |id: &str, bidder: &str| Bid {
            id: BidId(id.to_string()),
            auction_id: AuctionId(1),
            bidder: addr(bidder),
            amount: PlaintextSealer.seal(40).unwrap(),
            placed_at: start(),
            sealed: true,
        };
        let later_id = bid("1_0xbbb_1", "0xbbb");
        let earlier_id = bid("1_0xaaa_1", "0xaaa");
        let opened = [
            OpenedBid { bid: &later_id, amount: 40 },
            OpenedBid { bid: &earlier_id, amount: 40 },
        ];

        let winner = select_winner(&opened).unwrap();
        assert_eq!(winner.bid.bidder, addr("0xaaa"));
    }

    /// Sink that remembers which keys each batch carried.
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<String>>>,
    }

    impl DurableSink for RecordingSink {
        fn load_all(&self) -> Result<Vec<(String, Value)>, SinkError> {
            Ok(Vec::new())
        }

        fn apply(&self, changes: &[Change]) -> Result<(), SinkError> {
            let keys = changes.iter().map(|c| c.key.clone()).collect();
            self.batches.lock().unwrap().push(keys);
            Ok(())
        }
    }

    #[test]
    fn finalization_reaches_the_sink_as_one_batch() {
        let sink = Arc::new(RecordingSink::default());
        let store = KvStore::open(sink.clone());
        let clock = ManualClock::new(start());
        let repo = AuctionRepository::new(&store, &clock, &PlaintextSealer);
        let auction = repo
            .create(
                &AuctionDraft::new("Vase", "Blue and white", 1.0, 10),
                &addr("0xcreator"),
            )
            .unwrap();
        repo.record_bid(auction.id, &addr("0xaaa"), 20).unwrap();

        clock.set(auction.ends_at);
        ResolutionEngine::new(&store, &clock, &PlaintextSealer)
            .finalize(auction.id)
            .unwrap();

        let batches = sink.batches.lock().unwrap();
        let mut last = batches.last().unwrap().clone();
        last.sort();
        assert_eq!(last, vec![keys::auction(auction.id), keys::result(auction.id)]);
    }
}
