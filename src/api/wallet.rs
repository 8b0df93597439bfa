// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet registration and purchase ingestion.
//!
//! Both endpoints are idempotent: registering a known wallet or replaying a
//! known purchase event succeeds without creating anything.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use tracing::{debug, info};

use crate::{
    error::{ApiError, ErrorBody},
    models::{DataResponse, RegisterWalletRequest, RevenueCatWebhook},
    state::AppState,
    storage::{
        repository::WALLET_ADDRESS_LEN, NewPurchase, PurchaseRepository, StoreError,
        WalletRepository,
    },
};

/// Tokens (in whole units) credited per store product.
const PRODUCT_TOKENS: [(&str, i64); 3] = [
    ("sentinel_dvpn_5000", 5_000),
    ("sentinel_dvpn_10000", 10_000),
    ("sentinel_dvpn_15000", 15_000),
];

/// Smallest units per whole token.
const DENOM_SCALE: i64 = 1_000_000;

/// Amount in the smallest unit credited for `product_id`.
pub fn product_amount(product_id: &str) -> Option<i64> {
    PRODUCT_TOKENS
        .iter()
        .find(|(id, _)| *id == product_id)
        .map(|(_, tokens)| tokens * DENOM_SCALE)
}

fn is_wallet_address(address: &str) -> bool {
    address.len() == WALLET_ADDRESS_LEN
}

/// Register a wallet so it receives a fee grant.
#[utoipa::path(
    post,
    path = "/wallet",
    tag = "Wallet",
    request_body = RegisterWalletRequest,
    responses(
        (status = 200, description = "Wallet registered (or already known)"),
        (status = 400, description = "Invalid wallet address", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn register_wallet(
    State(state): State<AppState>,
    payload: Result<Json<RegisterWalletRequest>, JsonRejection>,
) -> Result<Json<DataResponse<()>>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        state.reject(ApiError::invalid_request(format!("invalid request payload: {e}")))
    })?;

    let address = request.address.trim();
    if !is_wallet_address(address)
        || address.eq_ignore_ascii_case(&state.settings.fee_granter_address)
    {
        return Err(state.reject(ApiError::invalid_request("invalid wallet address")));
    }

    match WalletRepository::new(&state.db).register(address) {
        Ok(wallet) => info!(address = %wallet.address, "Registered wallet"),
        Err(StoreError::AlreadyExists(_)) => debug!(%address, "Wallet already registered"),
        Err(e) => return Err(state.reject(e)),
    }
    Ok(Json(DataResponse::empty()))
}

/// RevenueCat purchase webhook.
#[utoipa::path(
    post,
    path = "/webhooks/revenuecat",
    tag = "Wallet",
    request_body = RevenueCatWebhook,
    responses(
        (status = 200, description = "Purchase recorded (or already known)"),
        (status = 400, description = "Invalid authorization or payload", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn revenuecat_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RevenueCatWebhook>, JsonRejection>,
) -> Result<Json<DataResponse<()>>, ApiError> {
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == state.settings.revenuecat_auth);
    if !authorized {
        return Err(state.reject(ApiError::invalid_request("invalid authorization header")));
    }

    let Json(webhook) = payload.map_err(|e| {
        state.reject(ApiError::invalid_request(format!("invalid request payload: {e}")))
    })?;
    let event = webhook.event;

    if event.id.trim().is_empty() {
        return Err(state.reject(ApiError::invalid_request("invalid event id")));
    }
    let address = event.app_user_id.trim();
    if !is_wallet_address(address) {
        return Err(state.reject(ApiError::invalid_request("invalid wallet address")));
    }
    let Some(amount) = product_amount(&event.product_id) else {
        return Err(state.reject(ApiError::invalid_request("invalid product id")));
    };

    let purchase = NewPurchase {
        event_id: event.id.clone(),
        address: address.to_string(),
        amount,
        denom: state.settings.default_denom.clone(),
    };
    match PurchaseRepository::new(&state.db).create(purchase) {
        Ok(record) => info!(
            event_id = %record.event_id,
            address = %record.address,
            amount = record.amount,
            "Recorded purchase"
        ),
        Err(StoreError::AlreadyExists(_)) => {
            debug!(event_id = %event.id, "Purchase event already recorded")
        }
        Err(e) => return Err(state.reject(e)),
    }
    Ok(Json(DataResponse::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_amounts() {
        assert_eq!(product_amount("sentinel_dvpn_5000"), Some(5_000_000_000));
        assert_eq!(product_amount("sentinel_dvpn_15000"), Some(15_000_000_000));
        assert_eq!(product_amount("sentinel_dvpn_1"), None);
    }
}
