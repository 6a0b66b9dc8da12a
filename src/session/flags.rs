// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted session flags.
//!
//! The only code that reads or writes `appMode`, `walletMode`, `network`,
//! `walletAddress` and `<walletMode>LoggedOut`. Values written by other
//! collaborators are read leniently: an unparseable flag is treated as
//! absent.

use std::str::FromStr;

use serde_json::Value;

use crate::models::{AppMode, Network, WalletAddress, WalletMode};
use crate::storage::{keys, KvStore, StoreResult};

/// Snapshot of every persisted flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedFlags {
    pub app_mode: Option<AppMode>,
    pub wallet_mode: Option<WalletMode>,
    pub network: Option<Network>,
    pub wallet_address: Option<WalletAddress>,
    pub demo_logged_out: bool,
    pub external_logged_out: bool,
}

impl PersistedFlags {
    pub fn logged_out(&self, mode: WalletMode) -> bool {
        match mode {
            WalletMode::Demo => self.demo_logged_out,
            WalletMode::External => self.external_logged_out,
        }
    }
}

pub struct SessionFlags<'a> {
    store: &'a KvStore,
}

impl<'a> SessionFlags<'a> {
    pub fn new(store: &'a KvStore) -> Self {
        Self { store }
    }

    pub fn load(&self) -> PersistedFlags {
        PersistedFlags {
            app_mode: self.read_parsed(keys::APP_MODE_FLAG),
            wallet_mode: self.read_parsed(keys::WALLET_MODE_FLAG),
            network: self.read_parsed(keys::NETWORK_FLAG),
            wallet_address: self
                .read_string(keys::WALLET_ADDRESS_FLAG)
                .filter(|a| !a.trim().is_empty())
                .map(WalletAddress),
            demo_logged_out: self.read_bool(&keys::logged_out_flag(WalletMode::Demo)),
            external_logged_out: self.read_bool(&keys::logged_out_flag(WalletMode::External)),
        }
    }

    pub fn set_app_mode(&self, mode: AppMode) -> StoreResult<()> {
        self.store.set(keys::APP_MODE_FLAG, &mode)?;
        Ok(())
    }

    pub fn set_wallet_mode(&self, mode: WalletMode) -> StoreResult<()> {
        self.store.set(keys::WALLET_MODE_FLAG, &mode)?;
        Ok(())
    }

    pub fn set_network(&self, network: Network) -> StoreResult<()> {
        self.store.set(keys::NETWORK_FLAG, &network)?;
        Ok(())
    }

    pub fn set_wallet_address(&self, address: Option<&WalletAddress>) -> StoreResult<()> {
        match address {
            Some(address) => self.store.set(keys::WALLET_ADDRESS_FLAG, address)?,
            None => self.store.remove(keys::WALLET_ADDRESS_FLAG)?,
        };
        Ok(())
    }

    /// Set or clear the explicit-disconnect flag of one wallet mode.
    pub fn set_logged_out(&self, mode: WalletMode, logged_out: bool) -> StoreResult<()> {
        let key = keys::logged_out_flag(mode);
        if logged_out {
            self.store.set(&key, &true)?;
        } else {
            self.store.remove(&key)?;
        }
        Ok(())
    }

    fn read_string(&self, key: &str) -> Option<String> {
        match self.store.get::<Value>(key) {
            Ok(Some(Value::String(s))) => Some(s),
            Ok(Some(other)) => {
                tracing::warn!(flag = key, value = %other, "Ignoring non-string session flag");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(flag = key, error = %e, "Failed to read session flag");
                None
            }
        }
    }

    fn read_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.read_string(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(flag = key, value = %raw, "Ignoring unrecognised session flag");
                None
            }
        }
    }

    /// Accepts `true` and `"true"`.
    fn read_bool(&self, key: &str) -> bool {
        match self.store.get::<Value>(key) {
            Ok(Some(Value::Bool(b))) => b,
            Ok(Some(Value::String(s))) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}
