// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key layout of the persistent store.
//!
//! ```text
//! auction_{auction_id}                       Auction
//! bid_{auction_id}_{bidder}_{micros}         Bid (one key per bid, never overwritten)
//! result_{auction_id}                        FinalizationResult
//! audit_{micros:020}_{event_id}              AuditEvent
//! appMode | walletMode | network             session flags (read by the UI too)
//! walletAddress                              last connected address
//! {walletMode}LoggedOut                      explicit-disconnect flag per wallet mode
//! ```
//!
//! The flag names are a compatibility surface shared with the UI and must
//! not change.

use crate::models::{AuctionId, WalletAddress, WalletMode};

pub const AUCTION_PREFIX: &str = "auction_";
pub const BID_PREFIX: &str = "bid_";
pub const RESULT_PREFIX: &str = "result_";
pub const AUDIT_PREFIX: &str = "audit_";

pub const APP_MODE_FLAG: &str = "appMode";
pub const WALLET_MODE_FLAG: &str = "walletMode";
pub const NETWORK_FLAG: &str = "network";
pub const WALLET_ADDRESS_FLAG: &str = "walletAddress";

// ========== Auction Keys ==========

pub fn auction(auction_id: AuctionId) -> String {
    format!("{AUCTION_PREFIX}{auction_id}")
}

/// Prefix shared by every bid of one auction.
pub fn bids_of(auction_id: AuctionId) -> String {
    format!("{BID_PREFIX}{auction_id}_")
}

pub fn bid(auction_id: AuctionId, bidder: &WalletAddress, placed_at_micros: i64) -> String {
    format!("{}{}", bids_of(auction_id), bid_suffix(bidder, placed_at_micros))
}

/// The part of a bid key after the auction prefix, also used as the bid id tail.
pub fn bid_suffix(bidder: &WalletAddress, placed_at_micros: i64) -> String {
    format!("{bidder}_{placed_at_micros}")
}

pub fn result(auction_id: AuctionId) -> String {
    format!("{RESULT_PREFIX}{auction_id}")
}

// ========== Audit Keys ==========

/// Zero-padded so lexical key order is chronological.
pub fn audit(timestamp_micros: i64, event_id: &str) -> String {
    format!("{AUDIT_PREFIX}{:020}_{event_id}", timestamp_micros.max(0))
}

// ========== Session Flags ==========

pub fn logged_out_flag(mode: WalletMode) -> String {
    format!("{}LoggedOut", mode.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auction_and_result_keys() {
        assert_eq!(auction(AuctionId(17)), "auction_17");
        assert_eq!(result(AuctionId(17)), "result_17");
    }

    #[test]
    fn bid_keys_are_scoped_per_auction() {
        let bidder = WalletAddress::from("0xabc");
        let key = bid(AuctionId(1), &bidder, 1_700_000_000_000_000);
        assert_eq!(key, "bid_1_0xabc_1700000000000000");
        assert!(key.starts_with(&bids_of(AuctionId(1))));
        assert!(!key.starts_with(&bids_of(AuctionId(12))));
        assert!(!bid(AuctionId(12), &bidder, 5).starts_with(&bids_of(AuctionId(1))));
    }

    #[test]
    fn audit_keys_sort_chronologically() {
        let early = audit(9, "b");
        let late = audit(10, "a");
        assert!(early < late);
        assert_eq!(early, "audit_00000000000000000009_b");
    }

    #[test]
    fn logged_out_flag_names() {
        assert_eq!(logged_out_flag(WalletMode::Demo), "demoLoggedOut");
        assert_eq!(logged_out_flag(WalletMode::External), "externalLoggedOut");
    }
}
