// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire types returned by the Plan Wizard API.

use serde::Deserialize;

/// Price of a node for one unit (gigabyte or hour) in one denomination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodePrice {
    pub denom: String,
    pub amount: i64,
}

/// Facts the directory reports about one relay node.
///
/// Everything the node itself self-reports is optional: a node that has never
/// been reached by the directory has no moniker, location or peer counts.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NodeDescriptor {
    pub address: String,
    #[serde(default)]
    pub remote_url: String,
    #[serde(default)]
    pub gigabyte_prices: Vec<NodePrice>,
    #[serde(default)]
    pub hourly_prices: Vec<NodePrice>,

    pub moniker: Option<String>,
    pub bandwidth_upload: Option<i64>,
    pub bandwidth_download: Option<i64>,
    pub location_city: Option<String>,
    pub location_country: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lon: Option<f64>,
    pub peers: Option<i64>,
    pub max_peers: Option<i64>,
    /// Protocol code: `1` WireGuard, `2` V2Ray.
    #[serde(rename = "type")]
    pub node_type: Option<i64>,
    pub version: Option<String>,
}

/// Response envelope of the Plan Wizard API.
#[derive(Debug, Deserialize)]
pub(crate) struct PlanWizardEnvelope<T> {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub reason: String,
    pub data: Option<T>,
}
