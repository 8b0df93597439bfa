// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the Sentinel REST gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::types::{
    Allowance, FeeGrantRequest, SentinelEnvelope, SentinelTransaction, TransferRequest,
};
use crate::config::SentinelConfig;

/// Messages a granted wallet may pay fees for.
pub const ALLOWED_FEE_GRANT_MSGS: [&str; 3] = [
    "/sentinel.plan.v2.MsgSubscribeRequest",
    "/sentinel.session.v2.MsgStartRequest",
    "/sentinel.session.v2.MsgEndRequest",
];

#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    #[error("Sentinel request failed: {0}")]
    Request(String),

    #[error("Sentinel response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Sentinel returned success=false while {action}: {message}")]
    Rejected { action: &'static str, message: String },
}

/// Operations the reconcilers need from the ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// One page of allowances held by `address`. `Ok(None)` means no data.
    async fn fetch_allowances(
        &self,
        address: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Option<Vec<Allowance>>, SentinelError>;

    /// Grant fees to every address in one transaction.
    async fn grant_fee(&self, addresses: &[String]) -> Result<SentinelTransaction, SentinelError>;

    /// Send `amounts[i]` (amount + denom) to `addresses[i]` in one transaction.
    async fn send_tokens(
        &self,
        addresses: &[String],
        amounts: &[String],
        memo: &str,
    ) -> Result<SentinelTransaction, SentinelError>;
}

#[derive(Clone)]
pub struct SentinelClient {
    config: SentinelConfig,
    http: Client,
}

impl SentinelClient {
    pub fn new(config: SentinelConfig, timeout: Duration) -> Result<Self, SentinelError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SentinelError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        api_url(&self.config.api_endpoint, path)
    }

    /// Gas for a transaction touching `recipients` wallets.
    pub fn gas_for(&self, recipients: usize) -> u64 {
        let units = u64::try_from(recipients).map_or(u64::MAX, |n| n.saturating_add(1));
        self.config.gas_base.saturating_mul(units)
    }

    fn with_tx_params(&self, request: RequestBuilder, recipients: usize) -> RequestBuilder {
        let gas_prices = format!("{}{}", self.config.gas_price, self.config.default_denom);
        let gas = self.gas_for(recipients).to_string();
        request.query(&[
            ("rpc_address", self.config.rpc_endpoint.as_str()),
            ("chain_id", self.config.chain_id.as_str()),
            ("gas_prices", gas_prices.as_str()),
            ("gas", gas.as_str()),
            ("simulate_and_execute", "false"),
        ])
    }

    async fn send_envelope<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &'static str,
    ) -> Result<Option<T>, SentinelError> {
        let response = request
            .send()
            .await
            .map_err(|e| SentinelError::Request(format!("{action} failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SentinelError::Request(format!("{action} body read failed: {e}")))?;

        let envelope: SentinelEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                SentinelError::InvalidResponse(format!("{action} invalid JSON: {e}"))
            } else {
                SentinelError::Request(format!("{action} returned {status}: {body}"))
            }
        })?;

        if !envelope.success {
            let message = envelope
                .error
                .map(|e| format!("{} (code {})", e.message, e.code))
                .unwrap_or_default();
            return Err(SentinelError::Rejected { action, message });
        }
        Ok(envelope.result)
    }
}

#[async_trait]
impl Ledger for SentinelClient {
    async fn fetch_allowances(
        &self,
        address: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Option<Vec<Allowance>>, SentinelError> {
        let url = self.url(&format!("/api/v1/feegrants/{address}/allowances"));
        debug!(%address, limit, offset, "Fetching fee grant allowances");

        let limit = limit.to_string();
        let offset = offset.to_string();
        let request = self.http.get(url).query(&[
            ("rpc_address", self.config.rpc_endpoint.as_str()),
            ("chain_id", self.config.chain_id.as_str()),
            ("limit", limit.as_str()),
            ("offset", offset.as_str()),
        ]);
        self.send_envelope(request, "fetching fee grant allowances")
            .await
    }

    async fn grant_fee(&self, addresses: &[String]) -> Result<SentinelTransaction, SentinelError> {
        let action = "granting fee to wallets";
        let body = FeeGrantRequest {
            mnemonic: &self.config.fee_granter_mnemonic,
            acc_addresses: addresses,
            allowed_msgs: &ALLOWED_FEE_GRANT_MSGS,
        };
        let request = self.with_tx_params(
            self.http.post(self.url("/api/v1/feegrants")),
            addresses.len(),
        );
        self.send_envelope(request.json(&body), action)
            .await?
            .ok_or_else(|| SentinelError::InvalidResponse(format!("{action}: missing result")))
    }

    async fn send_tokens(
        &self,
        addresses: &[String],
        amounts: &[String],
        memo: &str,
    ) -> Result<SentinelTransaction, SentinelError> {
        let action = "sending tokens to wallets";
        if addresses.len() != amounts.len() {
            return Err(SentinelError::Request(format!(
                "{action}: {} addresses but {} amounts",
                addresses.len(),
                amounts.len()
            )));
        }
        let body = TransferRequest {
            mnemonic: &self.config.fee_granter_mnemonic,
            to_addresses: addresses,
            amounts,
            memo,
        };
        let request = self.with_tx_params(
            self.http.post(self.url("/api/v1/transfers")),
            addresses.len(),
        );
        self.send_envelope(request.json(&body), action)
            .await?
            .ok_or_else(|| SentinelError::InvalidResponse(format!("{action}: missing result")))
    }
}

fn api_url(endpoint: &Url, path: &str) -> String {
    format!("{}{}", endpoint.as_str().trim_end_matches('/'), path)
}
