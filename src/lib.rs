// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sealed Auction Engine - Auction Lifecycle & Session Identity Core
//!
//! In-process library behind the private-auction client. It stores
//! auctions and sealed bids, resolves winners once bidding closes, and
//! tracks which wallet identity the user acts as.
//!
//! ## Modules
//!
//! - `service` - Facade held by the UI layer ([`AuctionService`])
//! - `session` - Wallet session state machine and persisted flags
//! - `backend` - Demo (local store) and remote (HTTP node) execution backends
//! - `resolution` - Winner selection and finalization
//! - `storage` - Key-value store, redb durability, repositories, audit trail
//! - `config` / `telemetry` - Environment configuration and tracing setup

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod resolution;
pub mod sealing;
pub mod service;
pub mod session;
pub mod storage;
pub mod telemetry;

pub use config::EngineConfig;
pub use error::{AuctionError, AuctionResult, ClosedReason, FallbackAction};
pub use models::{
    AppMode, Auction, AuctionDraft, AuctionId, BidReceipt, Finalization, FinalizationResult,
    Network, WalletAddress, WalletMode, Winner,
};
pub use service::AuctionService;
pub use session::{Session, SessionState, WalletCapability, WalletProvider};
