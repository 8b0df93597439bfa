// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response shapes of the public API. Successful responses are
//! wrapped as `{"data": ...}`; handlers with nothing to return send `{}`.
//!
//! ## Model Categories
//!
//! - **Directory**: countries, cities and servers available to clients
//! - **Wallets**: wallet registration
//! - **Purchases**: the RevenueCat purchase webhook

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::storage::{CityRecord, CountryRecord, ServerRecord};

// =============================================================================
// Envelope
// =============================================================================

/// Success envelope. `data` is omitted when there is nothing to return.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data: Some(data) }
    }
}

impl DataResponse<()> {
    pub fn empty() -> Self {
        Self { data: None }
    }
}

// =============================================================================
// Health
// =============================================================================

/// Latest published client versions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VersionResponse {
    pub ios: String,
    pub android: String,
}

// =============================================================================
// Directory Models
// =============================================================================

/// Caller address and the coordinates of its network.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct IpResponse {
    pub ip: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CountryResponse {
    pub id: u64,
    pub name: String,
    /// ISO 3166-1 alpha-2 code.
    pub code: String,
    /// Active, non-banned servers in this country.
    pub servers_available: usize,
}

impl CountryResponse {
    pub fn new(country: CountryRecord, servers_available: usize) -> Self {
        Self {
            id: country.id,
            name: country.name,
            code: country.code,
            servers_available,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CityResponse {
    pub id: u64,
    pub country_id: u64,
    pub name: String,
    pub servers_available: usize,
}

impl CityResponse {
    pub fn new(city: CityRecord, servers_available: usize) -> Self {
        Self {
            id: city.id,
            country_id: city.country_id,
            name: city.name,
            servers_available,
        }
    }
}

/// A relay server as exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ServerResponse {
    pub id: u64,
    pub country_id: u64,
    pub city_id: u64,
    pub name: String,
    pub address: String,
    pub is_available: bool,
    /// Fraction of peer slots in use, between 0 and 1.
    pub load: f64,
    pub version: String,
    pub latitude: f64,
    pub longitude: f64,
    pub upload_speed: i64,
    pub download_speed: i64,
    pub remote_url: String,
    /// `WIREGUARD` or `V2RAY`.
    pub protocol: String,
}

impl From<&ServerRecord> for ServerResponse {
    fn from(server: &ServerRecord) -> Self {
        let config = &server.configuration;
        Self {
            id: server.id,
            country_id: server.country_id,
            city_id: server.city_id,
            name: server.name.clone(),
            address: server.address.clone(),
            is_available: server.is_available(),
            load: server.current_load,
            version: config.version.clone(),
            latitude: config.location_lat,
            longitude: config.location_lon,
            upload_speed: config.bandwidth_upload,
            download_speed: config.bandwidth_download,
            remote_url: config.remote_url.clone(),
            protocol: server.protocol.as_str().to_string(),
        }
    }
}

/// Optional protocol filter (`WIREGUARD`, `V2RAY`, `ALL` or empty).
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProtocolParams {
    pub protocol: Option<String>,
}

/// Query parameters for listing servers in a city.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ServerListParams {
    /// Only `CURRENT_LOAD` is supported.
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServersByAddressRequest {
    pub addresses: Vec<String>,
}

// =============================================================================
// Wallet Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterWalletRequest {
    /// 43-character ledger account address.
    pub address: String,
}

// =============================================================================
// Purchase Webhook Models
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RevenueCatEvent {
    /// Unique event id, used to drop redelivered webhooks.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub product_id: String,
    /// Wallet address the purchase is credited to.
    #[serde(default)]
    pub app_user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RevenueCatWebhook {
    pub event: RevenueCatEvent,
}
