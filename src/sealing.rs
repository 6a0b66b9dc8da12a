// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bid sealing seam.
//!
//! Bids are stored as [`SealedAmount`]s produced by a [`BidSealer`]. The
//! repository seals at placement time and only the resolution engine opens
//! them. The shipped [`PlaintextSealer`] does no cryptography: it stores the
//! amount's big-endian bytes. A real confidential-bid layer replaces the
//! sealer without touching the repository or facade contracts.

use std::fmt;

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AuctionError;

#[derive(Debug, thiserror::Error)]
pub enum SealingError {
    #[error("malformed sealed amount: {0}")]
    Malformed(String),

    #[error("sealer failure: {0}")]
    Backend(String),
}

impl From<SealingError> for AuctionError {
    fn from(e: SealingError) -> Self {
        AuctionError::Sealing(e.to_string())
    }
}

/// Opaque bid amount. Serialized as base64; `Debug` never shows contents.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedAmount(Vec<u8>);

impl SealedAmount {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SealedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedAmount(<{} bytes>)", self.0.len())
    }
}

impl Serialize for SealedAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64::encode_string(&self.0))
    }
}

impl<'de> Deserialize<'de> for SealedAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Base64::decode_vec(&encoded)
            .map(SealedAmount)
            .map_err(|e| serde::de::Error::custom(format!("invalid sealed amount: {e}")))
    }
}

pub trait BidSealer: Send + Sync {
    fn seal(&self, amount: u64) -> Result<SealedAmount, SealingError>;

    fn open(&self, sealed: &SealedAmount) -> Result<u64, SealingError>;
}

/// Stores amounts in clear.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextSealer;

impl BidSealer for PlaintextSealer {
    fn seal(&self, amount: u64) -> Result<SealedAmount, SealingError> {
        Ok(SealedAmount(amount.to_be_bytes().to_vec()))
    }

    fn open(&self, sealed: &SealedAmount) -> Result<u64, SealingError> {
        let bytes: [u8; 8] = sealed.as_bytes().try_into().map_err(|_| {
            SealingError::Malformed(format!("expected 8 bytes, got {}", sealed.as_bytes().len()))
        })?;
        Ok(u64::from_be_bytes(bytes))
    }
}
