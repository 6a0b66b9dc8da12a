// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Identity
//!
//! Resolves which wallet address may act on auctions.
//!
//! ## States
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected(address, wallet mode, network)
//!                               |
//!                               +--rejected--> Disconnected (connection_error set)
//! Connected --disconnect--> Disconnected (<walletMode>LoggedOut = true)
//! ```
//!
//! ## Restore Rules
//!
//! On startup the persisted flags are reconciled (app mode wins over a
//! contradicting wallet mode). A demo identity is always restored from the
//! persisted address. An external identity is restored only if the user did
//! not explicitly disconnect it. A persisted remote network that does not
//! answer falls back to local.
//!
//! The session lock is never held across an await: wallet provider calls and
//! network probes run unlocked, and a generation counter detects a mode
//! switch or disconnect that happened meanwhile.

pub mod flags;
pub mod wallet;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::audit_log;
use crate::backend::NetworkProbe;
use crate::clock::Clock;
use crate::error::{AuctionError, AuctionResult};
use crate::models::{AppMode, Network, WalletAddress, WalletMode};
use crate::storage::{AuditEvent, AuditEventType, KvStore};

pub use flags::{PersistedFlags, SessionFlags};
pub use wallet::{
    demo_address, WalletCapability, WalletProvider, WalletProviderError, DEFAULT_PROVIDER_ID,
};

/// A resolved identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub address: WalletAddress,
    pub wallet_mode: WalletMode,
    pub network: Network,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected(Identity),
}

/// Mode, network and identity under which the user acts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub app_mode: AppMode,
    pub wallet_mode: WalletMode,
    pub network: Network,
    pub state: SessionState,
    /// Why the last connect attempt failed. Cleared by the next attempt and
    /// by a mode switch.
    pub connection_error: Option<String>,
}

impl Session {
    pub fn active_address(&self) -> Option<&WalletAddress> {
        match &self.state {
            SessionState::Connected(identity) => Some(&identity.address),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected(_))
    }
}

/// Outcome of [`SessionManager::switch_network`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSwitch {
    pub requested: Network,
    /// Network actually in effect; `Local` after a fallback.
    pub active: Network,
    pub disconnected: bool,
    /// Why the requested network was abandoned.
    pub fallback: Option<String>,
}

/// Outcome of [`SessionManager::switch_mode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeSwitch {
    pub previous: AppMode,
    pub app_mode: AppMode,
    pub wallet_mode: WalletMode,
    pub disconnected: bool,
}

struct Inner {
    session: Session,
    /// Bumped by every disconnect and mode switch.
    generation: u64,
    notices: Vec<String>,
}

pub struct SessionManager {
    store: Arc<KvStore>,
    clock: Arc<dyn Clock>,
    probe: Arc<dyn NetworkProbe>,
    wallet: WalletCapability,
    inner: RwLock<Inner>,
}

impl SessionManager {
    /// Rebuild the session from persisted flags.
    pub async fn hydrate(
        store: Arc<KvStore>,
        clock: Arc<dyn Clock>,
        probe: Arc<dyn NetworkProbe>,
        wallet: WalletCapability,
    ) -> AuctionResult<Self> {
        let flags = SessionFlags::new(&store);
        let persisted = flags.load();
        let mut notices = Vec::new();

        let app_mode = persisted
            .app_mode
            .or(persisted.wallet_mode.map(|mode| match mode {
                WalletMode::Demo => AppMode::Demo,
                WalletMode::External => AppMode::Real,
            }))
            .unwrap_or_default();
        let wallet_mode = app_mode.wallet_mode();

        // The persisted address belongs to the persisted wallet mode only
        let mut address = persisted.wallet_address.clone();
        if let Some(stale) = persisted.wallet_mode.filter(|mode| *mode != wallet_mode) {
            tracing::warn!(
                app_mode = %app_mode,
                persisted_wallet_mode = %stale,
                "Persisted wallet mode contradicts app mode; using {wallet_mode}"
            );
            address = None;
            flags.set_wallet_address(None)?;
        }

        let restored = match (wallet_mode, address) {
            (WalletMode::Demo, Some(address)) => Some(address),
            (WalletMode::External, Some(address)) if !persisted.logged_out(wallet_mode) => {
                Some(address)
            }
            (WalletMode::External, Some(_)) => {
                tracing::info!("External wallet was explicitly disconnected; not restoring");
                None
            }
            (_, None) => None,
        };

        let mut network = persisted.network.unwrap_or_default();
        if network != Network::Local {
            if let Err(e) = probe.probe(network).await {
                tracing::warn!(network = %network, error = %e, "Persisted network unreachable; falling back to local");
                notices.push(format!(
                    "{network} network is unreachable ({e}); switched to local"
                ));
                audit_log!(
                    &store,
                    AuditEvent::new(AuditEventType::NetworkFallback, clock.now())
                        .with_resource("network", network.as_str())
                        .failed(e.to_string())
                );
                network = Network::Local;
            }
        }

        flags.set_app_mode(app_mode)?;
        flags.set_wallet_mode(wallet_mode)?;
        flags.set_network(network)?;

        let state = match restored {
            Some(address) => {
                tracing::info!(address = %address, wallet_mode = %wallet_mode, network = %network, "Session restored");
                SessionState::Connected(Identity {
                    address,
                    wallet_mode,
                    network,
                })
            }
            None => SessionState::Disconnected,
        };

        Ok(Self {
            store,
            clock,
            probe,
            wallet,
            inner: RwLock::new(Inner {
                session: Session {
                    app_mode,
                    wallet_mode,
                    network,
                    state,
                    connection_error: None,
                },
                generation: 0,
                notices,
            }),
        })
    }

    pub async fn snapshot(&self) -> Session {
        self.inner.read().await.session.clone()
    }

    pub async fn current_address(&self) -> Option<WalletAddress> {
        self.inner.read().await.session.active_address().cloned()
    }

    pub async fn network(&self) -> Network {
        self.inner.read().await.session.network
    }

    pub async fn app_mode(&self) -> AppMode {
        self.inner.read().await.session.app_mode
    }

    /// Take the notices queued for the user (startup network fallback).
    pub async fn take_notices(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.write().await.notices)
    }

    /// Connect an identity in `mode`, which must be the session's wallet mode.
    ///
    /// Demo mode derives the address from `credentials` when given, otherwise
    /// generates one. External mode asks the wallet provider named by
    /// `credentials` (default [`DEFAULT_PROVIDER_ID`]).
    pub async fn connect(
        &self,
        mode: WalletMode,
        credentials: Option<&str>,
    ) -> AuctionResult<WalletAddress> {
        let generation = {
            let mut inner = self.inner.write().await;
            let session = &mut inner.session;
            if mode != session.wallet_mode {
                return Err(AuctionError::Validation(format!(
                    "cannot connect a {mode} wallet while in {} mode",
                    session.app_mode
                )));
            }
            match &session.state {
                SessionState::Connecting => {
                    return Err(AuctionError::ConnectionRejected(
                        "connection already in progress".to_string(),
                    ));
                }
                SessionState::Connected(identity) => return Ok(identity.address.clone()),
                SessionState::Disconnected => {}
            }
            session.state = SessionState::Connecting;
            session.connection_error = None;
            inner.generation
        };

        let attempt = match mode {
            WalletMode::Demo => Ok(demo_address(credentials)),
            WalletMode::External => self.connect_external(credentials).await,
        };

        let mut inner = self.inner.write().await;
        if inner.generation != generation
            || !matches!(inner.session.state, SessionState::Connecting)
        {
            tracing::info!(wallet_mode = %mode, "Discarding connect superseded by a session change");
            return Err(AuctionError::ConnectionRejected(
                "session changed while connecting".to_string(),
            ));
        }

        match attempt {
            Ok(address) => {
                let network = inner.session.network;
                inner.session.state = SessionState::Connected(Identity {
                    address: address.clone(),
                    wallet_mode: mode,
                    network,
                });

                let flags = SessionFlags::new(&self.store);
                flags.set_wallet_mode(mode)?;
                flags.set_wallet_address(Some(&address))?;
                flags.set_logged_out(mode, false)?;

                tracing::info!(address = %address, wallet_mode = %mode, network = %network, "Wallet connected");
                audit_log!(
                    &self.store,
                    AuditEvent::new(AuditEventType::SessionConnected, self.clock.now())
                        .with_actor(address.as_str())
                        .with_resource("wallet_mode", mode.as_str())
                );
                Ok(address)
            }
            Err(reason) => {
                inner.session.state = SessionState::Disconnected;
                inner.session.connection_error = Some(reason.clone());

                tracing::warn!(wallet_mode = %mode, reason = %reason, "Wallet connection rejected");
                audit_log!(
                    &self.store,
                    AuditEvent::new(AuditEventType::ConnectionRejected, self.clock.now())
                        .with_resource("wallet_mode", mode.as_str())
                        .failed(reason.as_str())
                );
                Err(AuctionError::ConnectionRejected(reason))
            }
        }
    }

    /// Drop the current identity. Marks the wallet mode as explicitly logged
    /// out so an external session does not come back on restart. Returns
    /// whether an identity was connected.
    pub async fn disconnect(&self) -> AuctionResult<bool> {
        let dropped = {
            let mut inner = self.inner.write().await;
            self.disconnect_locked(&mut inner)?
        };

        if let Some(identity) = &dropped {
            if identity.wallet_mode == WalletMode::External {
                self.release_provider().await;
            }
        }
        Ok(dropped.is_some())
    }

    /// Move to another network. Any connected identity is dropped first. An
    /// unreachable remote network falls back to local.
    pub async fn switch_network(&self, requested: Network) -> AuctionResult<NetworkSwitch> {
        let current = self.network().await;
        if requested == current {
            return Ok(NetworkSwitch {
                requested,
                active: current,
                disconnected: false,
                fallback: None,
            });
        }

        let disconnected = self.disconnect().await?;

        let (active, fallback) = match self.probe.probe(requested).await {
            Ok(()) => (requested, None),
            Err(e) if requested != Network::Local => {
                tracing::warn!(network = %requested, error = %e, "Network unreachable; falling back to local");
                audit_log!(
                    &self.store,
                    AuditEvent::new(AuditEventType::NetworkFallback, self.clock.now())
                        .with_resource("network", requested.as_str())
                        .failed(e.to_string())
                );
                (Network::Local, Some(e.to_string()))
            }
            Err(e) => return Err(e),
        };

        // A connect that finished while the network check was pending is bound to the old network
        let stale = {
            let mut inner = self.inner.write().await;
            inner.session.network = active;
            SessionFlags::new(&self.store).set_network(active)?;

            let bound_elsewhere = matches!(
                &inner.session.state,
                SessionState::Connected(identity) if identity.network != active
            );
            if bound_elsewhere {
                self.disconnect_locked(&mut inner)?
            } else {
                None
            }
        };
        if let Some(identity) = &stale {
            if identity.wallet_mode == WalletMode::External {
                self.release_provider().await;
            }
        }
        let disconnected = disconnected || stale.is_some();

        tracing::info!(from = %current, requested = %requested, active = %active, "Network switched");
        audit_log!(
            &self.store,
            AuditEvent::new(AuditEventType::NetworkSwitched, self.clock.now())
                .with_resource("network", active.as_str())
                .with_details(serde_json::json!({ "from": current, "requested": requested }))
        );

        Ok(NetworkSwitch {
            requested,
            active,
            disconnected,
            fallback,
        })
    }

    /// Switch between demo and real app mode, dropping any identity first.
    pub async fn switch_mode(&self, app_mode: AppMode) -> AuctionResult<ModeSwitch> {
        let previous = self.app_mode().await;
        if app_mode == previous {
            return Ok(ModeSwitch {
                previous,
                app_mode,
                wallet_mode: app_mode.wallet_mode(),
                disconnected: false,
            });
        }

        let disconnected = self.disconnect().await?;
        let wallet_mode = app_mode.wallet_mode();

        {
            let mut inner = self.inner.write().await;
            inner.generation += 1;
            inner.session.app_mode = app_mode;
            inner.session.wallet_mode = wallet_mode;
            inner.session.connection_error = None;

            let flags = SessionFlags::new(&self.store);
            flags.set_app_mode(app_mode)?;
            flags.set_wallet_mode(wallet_mode)?;
        }

        tracing::info!(from = %previous, to = %app_mode, "App mode switched");
        audit_log!(
            &self.store,
            AuditEvent::new(AuditEventType::ModeSwitched, self.clock.now())
                .with_resource("app_mode", app_mode.as_str())
                .with_details(serde_json::json!({ "from": previous }))
        );

        Ok(ModeSwitch {
            previous,
            app_mode,
            wallet_mode,
            disconnected,
        })
    }

    async fn connect_external(&self, provider_id: Option<&str>) -> Result<WalletAddress, String> {
        let provider = self.wallet.provider()?;
        let provider_id = provider_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_PROVIDER_ID);

        match provider.connect(provider_id).await {
            Ok(address) if !address.trim().is_empty() => Ok(WalletAddress(address)),
            Ok(_) => Err(format!("{provider_id} returned an empty address")),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Returns the identity that was connected, if any. A pending connect is
    /// cancelled without touching persisted flags.
    fn disconnect_locked(&self, inner: &mut Inner) -> AuctionResult<Option<Identity>> {
        let previous = std::mem::replace(&mut inner.session.state, SessionState::Disconnected);
        inner.generation += 1;

        let identity = match previous {
            SessionState::Connected(identity) => identity,
            SessionState::Connecting => {
                tracing::debug!("Pending connect cancelled");
                return Ok(None);
            }
            SessionState::Disconnected => return Ok(None),
        };

        let flags = SessionFlags::new(&self.store);
        flags.set_logged_out(identity.wallet_mode, true)?;
        flags.set_wallet_address(None)?;

        tracing::info!(address = %identity.address, wallet_mode = %identity.wallet_mode, "Wallet disconnected");
        audit_log!(
            &self.store,
            AuditEvent::new(AuditEventType::SessionDisconnected, self.clock.now())
                .with_actor(identity.address.as_str())
                .with_resource("wallet_mode", identity.wallet_mode.as_str())
        );
        Ok(Some(identity))
    }

    async fn release_provider(&self) {
        if let WalletCapability::Available(provider) = &self.wallet {
            if let Err(e) = provider.disconnect().await {
                tracing::warn!(error = %e, "Wallet provider disconnect failed");
            }
        }
    }
}
