// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller IP geolocation.
//!
//! The caller address comes from `CF-Connecting-IP`, then the first
//! `X-Forwarded-For` entry, then the TCP peer.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{rejection::ExtensionRejection, ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use tracing::debug;

use crate::{
    error::{ApiError, ErrorBody},
    models::{DataResponse, IpResponse},
    state::AppState,
    storage::{canonical_ip, NetworkRepository},
};

const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

fn header_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Raw caller address, before parsing.
pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(ip) = header_value(headers, CF_CONNECTING_IP) {
        return Some(ip.to_string());
    }
    if let Some(forwarded) = header_value(headers, X_FORWARDED_FOR) {
        let first = forwarded.split(',').next().map(str::trim).unwrap_or_default();
        if !first.is_empty() {
            return Some(first.to_string());
        }
    }
    peer.map(|addr| addr.ip().to_string())
}

/// Caller IP and the coordinates of the network containing it.
#[utoipa::path(
    get,
    path = "/ip",
    tag = "Directory",
    responses(
        (status = 200, description = "Caller IP and location, wrapped in `data`", body = IpResponse),
        (status = 500, description = "Address unknown or not in any known network", body = ErrorBody)
    )
)]
pub async fn ip_location(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
) -> Result<Json<DataResponse<IpResponse>>, ApiError> {
    let peer = peer.ok().map(|ConnectInfo(addr)| addr);
    let ip = client_ip(&headers, peer)
        .and_then(|raw| raw.parse::<IpAddr>().ok())
        .map(canonical_ip)
        .ok_or_else(|| state.reject(ApiError::unknown("failed to get IP address")))?;

    let network = NetworkRepository::new(&state.db)
        .find_containing(ip)
        .map_err(|e| state.reject(e))?
        .ok_or_else(|| {
            state.reject(ApiError::unknown(format!(
                "failed to find matching IP range for {ip}"
            )))
        })?;
    debug!(%ip, network = %network.network, "Located client IP");

    Ok(Json(DataResponse::new(IpResponse {
        ip: ip.to_string(),
        latitude: network.latitude,
        longitude: network.longitude,
    })))
}
