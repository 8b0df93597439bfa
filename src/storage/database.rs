// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded relay/wallet database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `servers`: server address → serialized ServerRecord
//! - `countries` / `country_names`: id → CountryRecord, name → id
//! - `cities` / `city_keys`: id → CityRecord, `country_id|name` → id
//! - `wallets` / `pending_wallets`: address → WalletRecord, id → address
//!   (only wallets still waiting for a fee grant)
//! - `purchases` / `unredeemed_purchases`: event id → PurchaseRecord,
//!   id → event id (only purchases not yet redeemed)
//! - `redemption_batches`: transfer memo → event ids of a chunk whose transfer
//!   failed (resubmitted with the same memo and membership)
//! - `networks`: (range start, prefix length) → NetworkRecord; IPv4 starts
//!   are stored IPv6-mapped
//! - `sequences`: sequence name → last allocated id
//! - `meta`: key → u64 (e.g. the last node revision stamp)

use std::path::Path;

use redb::{ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use serde::{de::DeserializeOwned, Serialize};

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const SERVERS: TableDefinition<&str, &[u8]> = TableDefinition::new("servers");

pub(crate) const COUNTRIES: TableDefinition<u64, &[u8]> = TableDefinition::new("countries");

pub(crate) const COUNTRY_NAMES: TableDefinition<&str, u64> = TableDefinition::new("country_names");

pub(crate) const CITIES: TableDefinition<u64, &[u8]> = TableDefinition::new("cities");

/// Key format: `country_id|city_name`.
pub(crate) const CITY_KEYS: TableDefinition<&str, u64> = TableDefinition::new("city_keys");

pub(crate) const WALLETS: TableDefinition<&str, &[u8]> = TableDefinition::new("wallets");

pub(crate) const PENDING_WALLETS: TableDefinition<u64, &str> =
    TableDefinition::new("pending_wallets");

pub(crate) const PURCHASES: TableDefinition<&str, &[u8]> = TableDefinition::new("purchases");

pub(crate) const UNREDEEMED_PURCHASES: TableDefinition<u64, &str> =
    TableDefinition::new("unredeemed_purchases");

pub(crate) const REDEMPTION_BATCHES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("redemption_batches");

/// Key format: (network start as u128, prefix length).
pub(crate) const NETWORKS: TableDefinition<(u128, u8), &[u8]> = TableDefinition::new("networks");

pub(crate) const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

pub(crate) const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the local store.
///
/// Created once at startup and passed explicitly (as `Arc<Database>`) to the
/// HTTP state and to every reconciler.
pub struct Database {
    db: redb::Database,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = redb::Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SERVERS)?;
            let _ = write_txn.open_table(COUNTRIES)?;
            let _ = write_txn.open_table(COUNTRY_NAMES)?;
            let _ = write_txn.open_table(CITIES)?;
            let _ = write_txn.open_table(CITY_KEYS)?;
            let _ = write_txn.open_table(WALLETS)?;
            let _ = write_txn.open_table(PENDING_WALLETS)?;
            let _ = write_txn.open_table(PURCHASES)?;
            let _ = write_txn.open_table(UNREDEEMED_PURCHASES)?;
            let _ = write_txn.open_table(REDEMPTION_BATCHES)?;
            let _ = write_txn.open_table(NETWORKS)?;
            let _ = write_txn.open_table(SEQUENCES)?;
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub(crate) fn inner(&self) -> &redb::Database {
        &self.db
    }

    /// Verify the store can serve a read transaction.
    pub fn health_check(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(META)?;
        let _ = table.get("revision")?;
        Ok(())
    }
}

// =============================================================================
// Helpers shared by the repositories
// =============================================================================

/// Allocate the next id of a named sequence inside an open write transaction.
pub(crate) fn next_id(write_txn: &WriteTransaction, sequence: &str) -> StoreResult<u64> {
    let mut table = write_txn.open_table(SEQUENCES)?;
    let current = table.get(sequence)?.map(|v| v.value()).unwrap_or(0);
    let next = current + 1;
    table.insert(sequence, next)?;
    Ok(next)
}

pub(crate) fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

// =============================================================================
// Tests
// =============================================================================
