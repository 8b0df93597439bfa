// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives in a single redb file under `DATA_DIR`. The HTTP
//! layer and the background jobs share one [`Database`] handle.
//!
//! ## Important Notes
//!
//! - Multi-row updates (stale server deactivation, fee-grant and redemption
//!   marking) each run in a single write transaction
//! - Records are stored as JSON values keyed by their natural key

pub mod database;
pub mod repository;

pub use database::{Database, StoreError, StoreResult};
pub use repository::{
    canonical_ip, load_country_seeds, load_network_seeds, CityRecord, CountryRecord, CountrySeed,
    GeoRepository, HeldBatch, NetworkRecord, NetworkRepository, NewPurchase, PurchaseRecord,
    PurchaseRepository, ServerConfiguration, ServerDraft, ServerProtocol, ServerQuery,
    ServerRecord, ServerRepository, ServerSort, UpsertOutcome, WalletRecord, WalletRepository,
};
