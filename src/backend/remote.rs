// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the remote execution backend.
//!
//! ## Wire Contract
//!
//! ```text
//! GET  /status                                          reachability
//! POST /contracts/{contract}/auctions                   create  -> {id}
//! GET  /contracts/{contract}/auctions                   list    -> [Auction]
//! GET  /contracts/{contract}/auctions/{id}              get     -> Auction | 404
//! POST /contracts/{contract}/auctions/{id}/bids         bid     -> {bid_id, placed_at}
//! POST /contracts/{contract}/auctions/{id}/finalize     close   -> FinalizeResponse
//! GET  /contracts/{contract}/auctions/{id}/winner       winner  -> Winner | 404
//! ```
//!
//! Rejections come back as 4xx with `{error, error_code}`. Transport
//! failures and 5xx mean the node is unusable and surface as
//! `BackendUnavailable`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuctionError, AuctionResult, ClosedReason};
use crate::models::{
    Auction, AuctionDraft, AuctionId, BidId, BidReceipt, Finalization, FinalizationResult,
    WalletAddress, Winner,
};

pub const CONTRACT_NOT_DEPLOYED: &str = "auction contract is not deployed";

/// `error_code` a node sends with a 404 for a contract it does not host.
pub const CONTRACT_NOT_DEPLOYED_CODE: &str = "contract_not_deployed";

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("auction contract is not deployed")]
    ContractNotDeployed,

    #[error("remote node unreachable: {0}")]
    Transport(String),

    #[error("remote node returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("remote node rejected the request: {}", .0.error)]
    Rejected(ApiErrorBody),

    #[error("invalid response from remote node: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Translate into the public taxonomy. `auction_id` supplies context the
    /// node may leave out of its error body.
    pub fn into_auction_error(self, auction_id: Option<AuctionId>) -> AuctionError {
        match self {
            RemoteError::ContractNotDeployed => {
                AuctionError::backend_unavailable(CONTRACT_NOT_DEPLOYED)
            }
            RemoteError::Transport(msg) => AuctionError::backend_unavailable(msg),
            e @ RemoteError::Server { .. } => AuctionError::backend_unavailable(e.to_string()),
            e @ RemoteError::InvalidResponse(_) => {
                AuctionError::backend_unavailable(e.to_string())
            }
            RemoteError::Rejected(body) => body.into_auction_error(auction_id),
        }
    }
}

impl From<RemoteError> for AuctionError {
    fn from(e: RemoteError) -> Self {
        e.into_auction_error(None)
    }
}

/// Error body returned with 4xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub auction_id: Option<AuctionId>,
    #[serde(default)]
    pub minimum: Option<u64>,
    #[serde(default)]
    pub reason: Option<ClosedReason>,
}

impl ApiErrorBody {
    fn into_auction_error(self, context: Option<AuctionId>) -> AuctionError {
        let auction_id = self.auction_id.or(context);
        match (self.error_code.as_deref(), auction_id) {
            (Some("auction_closed"), Some(auction_id)) => AuctionError::AuctionClosed {
                auction_id,
                reason: self.reason.unwrap_or(ClosedReason::Inactive),
            },
            (Some("too_early"), Some(auction_id)) => AuctionError::TooEarly { auction_id },
            (Some("bid_too_low"), _) => match self.minimum {
                Some(minimum) => AuctionError::BidTooLow { minimum },
                None => AuctionError::Validation(self.error),
            },
            (Some("not_found"), _) => AuctionError::NotFound(self.error),
            _ => AuctionError::Validation(self.error),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct CreateAuctionRequest<'a> {
    #[serde(flatten)]
    draft: &'a AuctionDraft,
    creator: &'a WalletAddress,
}

#[derive(Debug, Deserialize)]
struct CreatedAuction {
    id: AuctionId,
}

#[derive(Debug, Serialize)]
struct PlaceBidRequest<'a> {
    bidder: &'a WalletAddress,
    amount: u64,
}

#[derive(Debug, Deserialize)]
struct BidAck {
    bid_id: BidId,
    placed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FinalizeResponse {
    auction_id: AuctionId,
    #[serde(default)]
    winner: Option<WalletAddress>,
    #[serde(default)]
    winning_amount: Option<u64>,
    bid_count: usize,
    #[serde(default)]
    finalized_at: Option<DateTime<Utc>>,
}

impl From<FinalizeResponse> for Finalization {
    fn from(r: FinalizeResponse) -> Self {
        match (r.winner, r.winning_amount, r.finalized_at) {
            (Some(winner), Some(winning_amount), Some(finalized_at)) if r.bid_count > 0 => {
                Finalization::Winner(FinalizationResult {
                    auction_id: r.auction_id,
                    winner,
                    winning_amount,
                    bid_count: r.bid_count,
                    finalized_at,
                })
            }
            _ => Finalization::NoBids {
                auction_id: r.auction_id,
            },
        }
    }
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone)]
pub struct RemoteBackend {
    node_url: String,
    contract: Option<String>,
    http: Client,
}

impl RemoteBackend {
    /// Build a client for `node_url`. Without a contract address every
    /// auction call fails with `BackendUnavailable` and sends nothing.
    pub fn new(
        node_url: &Url,
        contract: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            node_url: node_url.as_str().trim_end_matches('/').to_string(),
            contract: contract.filter(|c| !c.trim().is_empty()),
            http,
        })
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    pub fn has_contract(&self) -> bool {
        self.contract.is_some()
    }

    /// Check that the node answers `GET /status` with a success code.
    pub async fn probe(&self) -> AuctionResult<()> {
        let response = self
            .http
            .get(format!("{}/status", self.node_url))
            .send()
            .await
            .map_err(|e| AuctionError::backend_unavailable(format!("remote node unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AuctionError::backend_unavailable(format!(
                "remote node status check returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    pub async fn create_auction(
        &self,
        draft: &AuctionDraft,
        creator: &WalletAddress,
    ) -> AuctionResult<Auction> {
        draft.validate()?;
        let url = self.auctions_url()?;
        let created: CreatedAuction = self
            .send(
                self.http.post(url).json(&CreateAuctionRequest { draft, creator }),
                None,
            )
            .await?;

        tracing::info!(auction_id = %created.id, creator = %creator, "Auction created on remote node");
        self.get_auction(created.id).await?.ok_or_else(|| {
            AuctionError::backend_unavailable(format!(
                "remote node did not return auction {} after creating it",
                created.id
            ))
        })
    }

    pub async fn place_bid(
        &self,
        auction_id: AuctionId,
        bidder: &WalletAddress,
        amount: u64,
    ) -> AuctionResult<BidReceipt> {
        let url = format!("{}/bids", self.auction_url(auction_id)?);
        let ack: BidAck = self
            .send(
                self.http.post(url).json(&PlaceBidRequest { bidder, amount }),
                Some(auction_id),
            )
            .await?;

        Ok(BidReceipt {
            bid_id: ack.bid_id,
            auction_id,
            placed_at: ack.placed_at,
        })
    }

    pub async fn finalize(&self, auction_id: AuctionId) -> AuctionResult<Finalization> {
        let url = format!("{}/finalize", self.auction_url(auction_id)?);
        let response: FinalizeResponse = self.send(self.http.post(url), Some(auction_id)).await?;
        Ok(response.into())
    }

    pub async fn get_auction(&self, auction_id: AuctionId) -> AuctionResult<Option<Auction>> {
        let url = self.auction_url(auction_id)?;
        self.send_optional(self.http.get(url), Some(auction_id)).await
    }

    pub async fn list_auctions(&self) -> AuctionResult<Vec<Auction>> {
        let url = self.auctions_url()?;
        self.send(self.http.get(url), None).await
    }

    pub async fn winner(&self, auction_id: AuctionId) -> AuctionResult<Option<Winner>> {
        let url = format!("{}/winner", self.auction_url(auction_id)?);
        self.send_optional(self.http.get(url), Some(auction_id)).await
    }

    fn auctions_url(&self) -> AuctionResult<String> {
        let contract = self
            .contract
            .as_deref()
            .ok_or_else(|| RemoteError::ContractNotDeployed.into_auction_error(None))?;
        Ok(format!("{}/contracts/{contract}/auctions", self.node_url))
    }

    fn auction_url(&self, auction_id: AuctionId) -> AuctionResult<String> {
        Ok(format!("{}/{auction_id}", self.auctions_url()?))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        auction_id: Option<AuctionId>,
    ) -> AuctionResult<T> {
        match self.execute(request).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(match auction_id {
                Some(id) => AuctionError::NotFound(format!("Auction {id}")),
                // Only the contract itself is addressed, so the contract is what is missing
                None => RemoteError::ContractNotDeployed.into_auction_error(None),
            }),
            Err(e) => Err(e.into_auction_error(auction_id)),
        }
    }

    async fn send_optional<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        auction_id: Option<AuctionId>,
    ) -> AuctionResult<Option<T>> {
        self.execute(request)
            .await
            .map_err(|e| e.into_auction_error(auction_id))
    }

    /// `Ok(None)` on 404, unless the node says the contract is unknown.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            let contract_missing = serde_json::from_str::<ApiErrorBody>(&body)
                .is_ok_and(|b| b.error_code.as_deref() == Some(CONTRACT_NOT_DEPLOYED_CODE));
            if contract_missing {
                return Err(RemoteError::ContractNotDeployed);
            }
            return Ok(None);
        }

        if status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Remote node server error");
            return Err(RemoteError::Server {
                status: status.as_u16(),
                message,
            });
        }

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<ApiErrorBody>(&body).unwrap_or(ApiErrorBody {
                error: if body.is_empty() {
                    format!("request rejected with {status}")
                } else {
                    body
                },
                error_code: None,
                auction_id: None,
                minimum: None,
                reason: None,
            });
            return Err(RemoteError::Rejected(parsed));
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }
}
