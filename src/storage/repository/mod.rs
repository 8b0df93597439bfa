// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the redb tables.
//!
//! Each repository borrows the shared [`Database`](super::Database) and owns
//! the operations for one entity type.

pub mod geo;
pub mod networks;
pub mod purchases;
pub mod servers;
pub mod wallets;

pub use geo::{load_country_seeds, CityRecord, CountryRecord, CountrySeed, GeoRepository};
pub use networks::{canonical_ip, load_network_seeds, NetworkRecord, NetworkRepository};
pub use purchases::{HeldBatch, NewPurchase, PurchaseRecord, PurchaseRepository};
pub use servers::{
    ServerConfiguration, ServerDraft, ServerProtocol, ServerQuery, ServerRecord,
    ServerRepository, ServerSort, UpsertOutcome,
};
pub use wallets::{normalize_address, WalletRecord, WalletRepository, WALLET_ADDRESS_LEN};
