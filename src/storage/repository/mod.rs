// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the key-value store.
//!
//! Each repository borrows the store for the duration of one operation and
//! owns the key layout of its entity type.

pub mod auctions;

pub use auctions::AuctionRepository;
