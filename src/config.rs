// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`EngineConfig`] loaded
//! from them when the engine is bootstrapped.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUCTION_DATA_DIR` | Directory holding the durable store | `./data` |
//! | `AUCTION_REMOTE_NODE_URL` | Base URL of the remote execution node | public alpha testnet node |
//! | `AUCTION_CONTRACT_ADDRESS` | Deployed auction contract on the remote node | unset |
//! | `AUCTION_PROBE_TIMEOUT_MS` | Reachability probe and request timeout | `3000` |
//! | `AUCTION_SEED_DEMO` | Seed demo auctions into an empty store | `true` |
//! | `AUCTION_AUDIT_RETENTION_DAYS` | Audit events older than this are pruned at startup; `0` keeps all | `30` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,sealed_auction_engine=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::AuctionError;

/// Directory holding `auction-store.redb`.
pub const DATA_DIR_ENV: &str = "AUCTION_DATA_DIR";

/// Base URL of the remote execution node.
pub const REMOTE_NODE_URL_ENV: &str = "AUCTION_REMOTE_NODE_URL";

/// Address of the auction contract on the remote node.
///
/// # Default
/// Unset: every remote auction call fails with `BackendUnavailable` until a
/// contract is deployed and configured.
pub const CONTRACT_ADDRESS_ENV: &str = "AUCTION_CONTRACT_ADDRESS";

pub const PROBE_TIMEOUT_MS_ENV: &str = "AUCTION_PROBE_TIMEOUT_MS";

pub const SEED_DEMO_ENV: &str = "AUCTION_SEED_DEMO";

pub const AUDIT_RETENTION_DAYS_ENV: &str = "AUCTION_AUDIT_RETENTION_DAYS";

/// Logging format: `json` for production aggregation, `pretty` for local
/// development.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_REMOTE_NODE_URL: &str = "https://aztec-alpha-testnet-fullnode.zkv.xyz";
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_AUDIT_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_LOG_FILTER: &str = "info,sealed_auction_engine=debug";

/// File name of the durable store inside the data directory.
pub const STORE_FILE_NAME: &str = "auction-store.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl From<ConfigError> for AuctionError {
    fn from(e: ConfigError) -> Self {
        AuctionError::Validation(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("expected `json` or `pretty`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub remote_node_url: Url,
    pub contract_address: Option<String>,
    pub probe_timeout: Duration,
    pub seed_demo: bool,
    /// `None` keeps every audit event.
    pub audit_retention_days: Option<u32>,
    pub log_format: LogFormat,
}

impl EngineConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load through `lookup`; a `None` or blank value means "use the default".
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let data_dir = get(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let node_url = get(REMOTE_NODE_URL_ENV).unwrap_or_else(|| DEFAULT_REMOTE_NODE_URL.to_string());
        let remote_node_url = Url::parse(node_url.trim()).map_err(|e| ConfigError::Invalid {
            var: REMOTE_NODE_URL_ENV,
            reason: e.to_string(),
        })?;
        if !matches!(remote_node_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                var: REMOTE_NODE_URL_ENV,
                reason: format!("unsupported scheme `{}`", remote_node_url.scheme()),
            });
        }

        let probe_timeout = match get(PROBE_TIMEOUT_MS_ENV) {
            Some(raw) => {
                let ms: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    var: PROBE_TIMEOUT_MS_ENV,
                    reason: format!("`{raw}` is not a number of milliseconds"),
                })?;
                Duration::from_millis(ms)
            }
            None => Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
        };

        let seed_demo = match get(SEED_DEMO_ENV) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                var: SEED_DEMO_ENV,
                reason: format!("`{raw}` is not a boolean"),
            })?,
            None => true,
        };

        let audit_retention_days = match get(AUDIT_RETENTION_DAYS_ENV) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| ConfigError::Invalid {
                var: AUDIT_RETENTION_DAYS_ENV,
                reason: format!("`{raw}` is not a number of days"),
            })?,
            None => DEFAULT_AUDIT_RETENTION_DAYS,
        };

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                var: LOG_FORMAT_ENV,
                reason,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            data_dir,
            remote_node_url,
            contract_address: get(CONTRACT_ADDRESS_ENV).map(|c| c.trim().to_string()),
            probe_timeout,
            seed_demo,
            audit_retention_days: Some(audit_retention_days).filter(|days| *days > 0),
            log_format,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.store_path(), PathBuf::from("./data/auction-store.redb"));
        assert_eq!(config.remote_node_url.as_str(), "https://aztec-alpha-testnet-fullnode.zkv.xyz/");
        assert_eq!(config.probe_timeout, Duration::from_millis(3000));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.contract_address.is_none());
        assert!(config.seed_demo);
        assert_eq!(config.audit_retention_days, Some(30));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            (DATA_DIR_ENV, "/var/lib/auctions"),
            (REMOTE_NODE_URL_ENV, "http://127.0.0.1:8080"),
            (CONTRACT_ADDRESS_ENV, " 0xauction "),
            (PROBE_TIMEOUT_MS_ENV, "250"),
            (SEED_DEMO_ENV, "off"),
            (AUDIT_RETENTION_DAYS_ENV, "0"),
            (LOG_FORMAT_ENV, "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/auctions"));
        assert_eq!(config.remote_node_url.as_str(), "http://127.0.0.1:8080/");
        assert_eq!(config.contract_address.as_deref(), Some("0xauction"));
        assert_eq!(config.probe_timeout, Duration::from_millis(250));
        assert!(!config.seed_demo);
        assert_eq!(config.audit_retention_days, None);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn blank_values_mean_default() {
        let config =
            EngineConfig::from_lookup(lookup(&[(CONTRACT_ADDRESS_ENV, "  "), (LOG_FORMAT_ENV, "")]))
                .unwrap();
        assert!(config.contract_address.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (var, value) in [
            (REMOTE_NODE_URL_ENV, "not a url"),
            (REMOTE_NODE_URL_ENV, "ftp://node.example"),
            (PROBE_TIMEOUT_MS_ENV, "soon"),
            (SEED_DEMO_ENV, "maybe"),
            (AUDIT_RETENTION_DAYS_ENV, "-3"),
            (LOG_FORMAT_ENV, "xml"),
        ] {
            let err = EngineConfig::from_lookup(lookup(&[(var, value)])).unwrap_err();
            assert!(err.to_string().contains(var), "{var}={value}: {err}");
        }
    }
}
