// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy surfaced to the UI layer.
//!
//! Repository and resolution code raise these directly. The service facade
//! passes them through unchanged, except that it may attach a
//! [`FallbackAction`] to [`AuctionError::BackendUnavailable`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::AuctionId;

/// Why an auction refused a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedReason {
    /// Already finalized.
    Inactive,
    /// Deadline passed, not yet finalized.
    Expired,
}

impl fmt::Display for ClosedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosedReason::Inactive => f.write_str("auction is no longer active"),
            ClosedReason::Expired => f.write_str("bidding period has ended"),
        }
    }
}

/// Recovery the UI can offer when the backend is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackAction {
    SwitchToLocalNetwork,
    SwitchToDemoMode,
}

impl fmt::Display for FallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackAction::SwitchToLocalNetwork => f.write_str("switch to the local network"),
            FallbackAction::SwitchToDemoMode => f.write_str("switch to demo mode"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuctionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Auction {auction_id} is closed: {reason}")]
    AuctionClosed {
        auction_id: AuctionId,
        reason: ClosedReason,
    },

    #[error("Bid is below the minimum bid of {minimum}")]
    BidTooLow { minimum: u64 },

    #[error("No wallet is connected")]
    NotAuthenticated,

    #[error("Wallet connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("Backend unavailable: {reason}")]
    BackendUnavailable {
        reason: String,
        fallback: Option<FallbackAction>,
    },

    #[error("Auction {auction_id} cannot be finalized before it ends")]
    TooEarly { auction_id: AuctionId },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Sealing error: {0}")]
    Sealing(String),
}

impl AuctionError {
    pub fn backend_unavailable(reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            reason: reason.into(),
            fallback: None,
        }
    }

    /// Stable machine-readable code for UI branching.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuctionError::Validation(_) => "validation_error",
            AuctionError::NotFound(_) => "not_found",
            AuctionError::AuctionClosed { .. } => "auction_closed",
            AuctionError::BidTooLow { .. } => "bid_too_low",
            AuctionError::NotAuthenticated => "not_authenticated",
            AuctionError::ConnectionRejected(_) => "connection_rejected",
            AuctionError::BackendUnavailable { .. } => "backend_unavailable",
            AuctionError::TooEarly { .. } => "too_early",
            AuctionError::Storage(_) => "storage_error",
            AuctionError::Sealing(_) => "sealing_error",
        }
    }

    /// Attach a suggested recovery to a `BackendUnavailable` error.
    /// Other variants are returned untouched.
    pub fn with_fallback(self, action: FallbackAction) -> Self {
        match self {
            AuctionError::BackendUnavailable { reason, .. } => AuctionError::BackendUnavailable {
                reason,
                fallback: Some(action),
            },
            other => other,
        }
    }
}

pub type AuctionResult<T> = Result<T, AuctionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            AuctionError::Validation("x".into()).error_code(),
            "validation_error"
        );
        assert_eq!(AuctionError::NotAuthenticated.error_code(), "not_authenticated");
        assert_eq!(
            AuctionError::TooEarly {
                auction_id: AuctionId(1)
            }
            .error_code(),
            "too_early"
        );
        assert_eq!(
            AuctionError::backend_unavailable("down").error_code(),
            "backend_unavailable"
        );
    }

    #[test]
    fn with_fallback_only_touches_backend_errors() {
        let enriched = AuctionError::backend_unavailable("contract missing")
            .with_fallback(FallbackAction::SwitchToLocalNetwork);
        assert_eq!(
            enriched,
            AuctionError::BackendUnavailable {
                reason: "contract missing".to_string(),
                fallback: Some(FallbackAction::SwitchToLocalNetwork),
            }
        );

        let untouched = AuctionError::BidTooLow { minimum: 5 }
            .with_fallback(FallbackAction::SwitchToDemoMode);
        assert_eq!(untouched, AuctionError::BidTooLow { minimum: 5 });
    }

    #[test]
    fn display_includes_context() {
        let err = AuctionError::AuctionClosed {
            auction_id: AuctionId(9),
            reason: ClosedReason::Expired,
        };
        assert_eq!(err.to_string(), "Auction 9 is closed: bidding period has ended");
    }
}
