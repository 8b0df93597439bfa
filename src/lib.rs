// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! dVPN Server - VPN relay directory and token wallet ledger service
//!
//! Serves the relay directory to mobile clients and keeps local state in
//! line with the Plan Wizard node directory and the Sentinel ledger.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `jobs` - Background reconcilers and their scheduler
//! - `planwizard` - Node directory client
//! - `sentinel` - Ledger gateway client (fee grants, token transfers)
//! - `storage` - Embedded redb store

pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod planwizard;
pub mod sentinel;
pub mod state;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_util;
