// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sentinel ledger gateway integration.
//!
//! This module provides functionality for:
//! - Listing fee-grant allowances held by a wallet
//! - Granting fees to a batch of wallets in one transaction
//! - Transferring tokens to a batch of wallets in one transaction

pub mod client;
pub mod types;

pub use client::{Ledger, SentinelClient, SentinelError, ALLOWED_FEE_GRANT_MSGS};
pub use types::{Allowance, AllowanceDetails, SentinelTransaction};
