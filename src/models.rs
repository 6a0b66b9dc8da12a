// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Domain Models
//!
//! Auction, bid and session value types shared by the repository, the
//! resolution engine, the backends and the service facade.
//!
//! ## Wallet Address Type
//!
//! The [`WalletAddress`] newtype wraps the identity string issued by a wallet
//! (demo-generated or provider-issued). It is opaque to the engine: no
//! checksum or length validation beyond "non-empty" is performed, since
//! external providers use their own address formats.
//!
//! ## Model Categories
//!
//! - **Auctions**: [`AuctionDraft`] (caller input), [`Auction`] (stored record)
//! - **Bids**: [`Bid`] (sealed, internal), [`BidReceipt`] (what callers see)
//! - **Results**: [`FinalizationResult`], [`Finalization`], [`Winner`]
//! - **Session flags**: [`AppMode`], [`WalletMode`], [`Network`]

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuctionError, ClosedReason};
use crate::sealing::SealedAmount;

/// Longest auction a caller may create (one year).
pub const MAX_DURATION_HOURS: f64 = 24.0 * 365.0;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

// =============================================================================
// Identifiers
// =============================================================================

/// Wallet identity under which a session acts.
///
/// # Example
///
/// ```rust,ignore
/// let addr = WalletAddress::from("0x742d35cc6634c0532925a3b844bc9e7595f4ab12");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WalletAddress {
    fn from(value: String) -> Self {
        WalletAddress(value)
    }
}

impl From<&str> for WalletAddress {
    fn from(value: &str) -> Self {
        WalletAddress(value.to_string())
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

/// Auction identifier. Time-derived at creation, bumped on collision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct AuctionId(pub u64);

impl fmt::Display for AuctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AuctionId {
    fn from(value: u64) -> Self {
        AuctionId(value)
    }
}

/// Bid identifier: `{auction_id}_{bidder}_{placed_at_micros}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct BidId(pub String);

impl fmt::Display for BidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Auctions
// =============================================================================

/// Caller-supplied parameters for a new auction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuctionDraft {
    pub item_name: String,
    pub description: String,
    /// Auction length in hours; fractional values are allowed.
    pub duration_hours: f64,
    pub minimum_bid: u64,
}

impl AuctionDraft {
    pub fn new(
        item_name: impl Into<String>,
        description: impl Into<String>,
        duration_hours: f64,
        minimum_bid: u64,
    ) -> Self {
        Self {
            item_name: item_name.into(),
            description: description.into(),
            duration_hours,
            minimum_bid,
        }
    }

    /// Check every input constraint, reporting the first violation.
    pub fn validate(&self) -> Result<(), AuctionError> {
        if self.item_name.trim().is_empty() {
            return Err(AuctionError::Validation(
                "item name must not be empty".to_string(),
            ));
        }
        if self.description.trim().is_empty() {
            return Err(AuctionError::Validation(
                "description must not be empty".to_string(),
            ));
        }
        if !self.duration_hours.is_finite() || self.duration_hours <= 0.0 {
            return Err(AuctionError::Validation(
                "duration must be a positive number of hours".to_string(),
            ));
        }
        if self.duration_hours > MAX_DURATION_HOURS {
            return Err(AuctionError::Validation(format!(
                "duration must not exceed {MAX_DURATION_HOURS} hours"
            )));
        }
        if self.minimum_bid == 0 {
            return Err(AuctionError::Validation(
                "minimum bid must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Duration rounded to whole milliseconds.
    pub fn duration(&self) -> Duration {
        Duration::milliseconds((self.duration_hours * MILLIS_PER_HOUR).round() as i64)
    }
}

/// Stored auction record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Auction {
    pub id: AuctionId,
    pub item_name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub minimum_bid: u64,
    pub creator: WalletAddress,
    /// `true` until finalization; flips exactly once.
    pub active: bool,
}

impl Auction {
    /// Whether the deadline has passed.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }

    /// Time left before the deadline, `None` once it has passed.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.has_ended(now) {
            None
        } else {
            Some(self.ends_at - now)
        }
    }

    pub fn is_accepting_bids(&self, now: DateTime<Utc>) -> bool {
        self.check_accepting_bids(now).is_ok()
    }

    /// Active-flag and deadline checks shared by every bid path.
    pub fn check_accepting_bids(&self, now: DateTime<Utc>) -> Result<(), AuctionError> {
        if !self.active {
            return Err(AuctionError::AuctionClosed {
                auction_id: self.id,
                reason: ClosedReason::Inactive,
            });
        }
        if self.has_ended(now) {
            return Err(AuctionError::AuctionClosed {
                auction_id: self.id,
                reason: ClosedReason::Expired,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Bids
// =============================================================================

/// Stored bid record. Immutable once written.
///
/// The amount is held as a [`SealedAmount`]; only the resolution engine
/// opens it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bid {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub bidder: WalletAddress,
    pub amount: SealedAmount,
    pub placed_at: DateTime<Utc>,
    pub sealed: bool,
}

/// Acknowledgement returned to the bidder. Carries no amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BidReceipt {
    pub bid_id: BidId,
    pub auction_id: AuctionId,
    pub placed_at: DateTime<Utc>,
}

impl From<&Bid> for BidReceipt {
    fn from(bid: &Bid) -> Self {
        Self {
            bid_id: bid.id.clone(),
            auction_id: bid.auction_id,
            placed_at: bid.placed_at,
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// Published outcome of an auction that closed with at least one bid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinalizationResult {
    pub auction_id: AuctionId,
    pub winner: WalletAddress,
    pub winning_amount: u64,
    pub bid_count: usize,
    pub finalized_at: DateTime<Utc>,
}

/// What `finalize` reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Finalization {
    Winner(FinalizationResult),
    NoBids { auction_id: AuctionId },
}

impl Finalization {
    pub fn auction_id(&self) -> AuctionId {
        match self {
            Finalization::Winner(result) => result.auction_id,
            Finalization::NoBids { auction_id } => *auction_id,
        }
    }

    pub fn result(&self) -> Option<&FinalizationResult> {
        match self {
            Finalization::Winner(result) => Some(result),
            Finalization::NoBids { .. } => None,
        }
    }
}

/// Winner announcement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Winner {
    pub address: WalletAddress,
    pub winning_amount: u64,
}

impl From<&FinalizationResult> for Winner {
    fn from(result: &FinalizationResult) -> Self {
        Self {
            address: result.winner.clone(),
            winning_amount: result.winning_amount,
        }
    }
}

// =============================================================================
// Session Flags
// =============================================================================

/// Application mode chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    Demo,
    Real,
}

impl AppMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppMode::Demo => "demo",
            AppMode::Real => "real",
        }
    }

    /// `demo` app mode pairs with demo wallets, `real` with external wallets.
    pub fn wallet_mode(&self) -> WalletMode {
        match self {
            AppMode::Demo => WalletMode::Demo,
            AppMode::Real => WalletMode::External,
        }
    }
}

impl Default for AppMode {
    fn default() -> Self {
        Self::Demo
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppMode {
    type Err = AuctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "demo" => Ok(AppMode::Demo),
            "real" => Ok(AppMode::Real),
            other => Err(AuctionError::Validation(format!("unknown app mode `{other}`"))),
        }
    }
}

/// Where the session identity comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletMode {
    /// Locally generated or secret-derived identity.
    Demo,
    /// Identity issued by an external wallet provider.
    External,
}

impl WalletMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletMode::Demo => "demo",
            WalletMode::External => "external",
        }
    }
}

impl Default for WalletMode {
    fn default() -> Self {
        Self::Demo
    }
}

impl fmt::Display for WalletMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletMode {
    type Err = AuctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "demo" => Ok(WalletMode::Demo),
            "external" => Ok(WalletMode::External),
            other => Err(AuctionError::Validation(format!(
                "unknown wallet mode `{other}`"
            ))),
        }
    }
}

/// Execution environment auctions are routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Store-backed local environment. Always reachable.
    Local,
    /// Remote execution backend.
    Remote,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Local => "local",
            Network::Remote => "remote",
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::Local
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = AuctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Network::Local),
            "remote" => Ok(Network::Remote),
            other => Err(AuctionError::Validation(format!("unknown network `{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_auction(active: bool) -> Auction {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Auction {
            id: AuctionId(42),
            item_name: "Vase".to_string(),
            description: "Ming dynasty".to_string(),
            created_at,
            ends_at: created_at + Duration::hours(1),
            minimum_bid: 100,
            creator: WalletAddress::from("0xcreator"),
            active,
        }
    }

    #[test]
    fn draft_validation_rejects_each_bad_field() {
        let ok = AuctionDraft::new("Vase", "Blue and white", 1.0, 100);
        assert!(ok.validate().is_ok());

        let cases = [
            AuctionDraft::new("  ", "desc", 1.0, 100),
            AuctionDraft::new("Vase", "", 1.0, 100),
            AuctionDraft::new("Vase", "desc", 0.0, 100),
            AuctionDraft::new("Vase", "desc", -2.0, 100),
            AuctionDraft::new("Vase", "desc", f64::NAN, 100),
            AuctionDraft::new("Vase", "desc", MAX_DURATION_HOURS + 1.0, 100),
            AuctionDraft::new("Vase", "desc", 1.0, 0),
        ];
        for draft in cases {
            assert!(
                matches!(draft.validate(), Err(AuctionError::Validation(_))),
                "expected validation error for {draft:?}"
            );
        }
    }

    #[test]
    fn draft_duration_supports_fractional_hours() {
        assert_eq!(AuctionDraft::new("a", "b", 1.0, 1).duration(), Duration::hours(1));
        assert_eq!(
            AuctionDraft::new("a", "b", 0.5, 1).duration(),
            Duration::minutes(30)
        );
    }

    #[test]
    fn auction_bid_window() {
        let auction = sample_auction(true);
        let before = auction.created_at + Duration::minutes(10);
        let at_deadline = auction.ends_at;

        assert!(auction.is_accepting_bids(before));
        assert_eq!(auction.time_remaining(before), Some(Duration::minutes(50)));

        assert!(!auction.is_accepting_bids(at_deadline));
        assert_eq!(auction.time_remaining(at_deadline), None);
        assert!(matches!(
            auction.check_accepting_bids(at_deadline),
            Err(AuctionError::AuctionClosed {
                reason: ClosedReason::Expired,
                ..
            })
        ));

        let inactive = sample_auction(false);
        assert!(matches!(
            inactive.check_accepting_bids(before),
            Err(AuctionError::AuctionClosed {
                reason: ClosedReason::Inactive,
                ..
            })
        ));
    }

    #[test]
    fn modes_parse_and_pair() {
        assert_eq!("demo".parse::<AppMode>().unwrap(), AppMode::Demo);
        assert_eq!("REAL".parse::<AppMode>().unwrap(), AppMode::Real);
        assert_eq!(AppMode::Real.wallet_mode(), WalletMode::External);
        assert_eq!(AppMode::Demo.wallet_mode(), WalletMode::Demo);
        assert_eq!("remote".parse::<Network>().unwrap(), Network::Remote);
        assert!("testnet".parse::<Network>().is_err());
        assert!("privy".parse::<WalletMode>().is_err());
    }

    #[test]
    fn mode_serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&WalletMode::External).unwrap(), r#""external""#);
        assert_eq!(serde_json::to_string(&Network::Local).unwrap(), r#""local""#);
        let mode: AppMode = serde_json::from_str(r#""real""#).unwrap();
        assert_eq!(mode, AppMode::Real);
    }

    #[test]
    fn finalization_serializes_with_outcome_tag() {
        let no_bids = Finalization::NoBids {
            auction_id: AuctionId(7),
        };
        let json = serde_json::to_value(&no_bids).unwrap();
        assert_eq!(json["outcome"], "no_bids");
        assert_eq!(json["auction_id"], 7);
        assert_eq!(no_bids.auction_id(), AuctionId(7));
        assert!(no_bids.result().is_none());
    }
}
