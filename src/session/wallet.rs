// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet collaborators.
//!
//! External wallets are reached through [`WalletProvider`]. Whether one is
//! present is decided once at startup and carried as a [`WalletCapability`].
//! Demo identities need no collaborator: they are derived locally.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::models::WalletAddress;

/// Provider used when `connect(external)` names none.
pub const DEFAULT_PROVIDER_ID: &str = "obsidion";

/// Bytes of the SHA-256 digest kept for a demo address.
const DEMO_ADDRESS_BYTES: usize = 20;

#[derive(Debug, Clone, thiserror::Error)]
pub enum WalletProviderError {
    #[error("user rejected the connection")]
    UserRejected,

    #[error("unknown wallet provider `{0}`")]
    UnknownProvider(String),

    #[error("wallet provider error: {0}")]
    Provider(String),
}

/// External wallet SDK adapter.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the provider for an account. Returns its address.
    async fn connect(&self, provider_id: &str) -> Result<String, WalletProviderError>;

    async fn disconnect(&self) -> Result<(), WalletProviderError>;

    async fn current_account(&self) -> Option<String>;
}

/// Result of detecting an external wallet SDK.
#[derive(Clone)]
pub enum WalletCapability {
    Available(Arc<dyn WalletProvider>),
    Unavailable(String),
}

impl WalletCapability {
    pub fn is_available(&self) -> bool {
        matches!(self, WalletCapability::Available(_))
    }

    pub(crate) fn provider(&self) -> Result<&Arc<dyn WalletProvider>, String> {
        match self {
            WalletCapability::Available(provider) => Ok(provider),
            WalletCapability::Unavailable(reason) => {
                Err(format!("external wallet unavailable: {reason}"))
            }
        }
    }
}

impl fmt::Debug for WalletCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletCapability::Available(_) => f.write_str("Available"),
            WalletCapability::Unavailable(reason) => write!(f, "Unavailable({reason})"),
        }
    }
}

/// Demo identity.
///
/// With a secret the address is the first 20 bytes of `SHA-256(secret)`, so
/// the same secret always yields the same address and the address does not
/// reveal the secret. Without one a fresh random address is generated.
pub fn demo_address(secret: Option<&str>) -> WalletAddress {
    let digest = match secret.filter(|s| !s.trim().is_empty()) {
        Some(secret) => Sha256::digest(secret.as_bytes()),
        None => Sha256::digest(uuid::Uuid::new_v4().as_bytes()),
    };

    let hex: String = digest[..DEMO_ADDRESS_BYTES]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    WalletAddress(format!("0x{hex}"))
}
