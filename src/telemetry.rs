// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tracing subscriber setup for the host application.
//!
//! The engine itself only emits `tracing` events. Hosts that do not install
//! their own subscriber call [`init_tracing`] once at startup.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, DEFAULT_LOG_FILTER};

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter = build_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .try_init(),
    };
    installed.is_ok()
}

/// `RUST_LOG` when it parses, the default filter otherwise.
fn build_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_filter() {
        let default = EnvFilter::new(DEFAULT_LOG_FILTER).to_string();
        assert_eq!(build_filter(None).to_string(), default);
        assert_eq!(build_filter(Some("  ")).to_string(), default);
        assert_eq!(build_filter(Some("warn")).to_string(), "warn");
    }

    #[test]
    fn second_init_is_harmless() {
        init_tracing(LogFormat::Pretty);
        assert!(!init_tracing(LogFormat::Json));
    }
}
