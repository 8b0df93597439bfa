// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet registry.
//!
//! Wallets are registered by address (lower-cased, 43 characters) and wait
//! in the `pending_wallets` index until the enrollment job confirms a fee
//! grant for them. `is_fee_granted` only ever moves from `false` to `true`.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

use crate::storage::database::{
    decode, encode, next_id, Database, StoreError, StoreResult, PENDING_WALLETS, WALLETS,
};

/// Length of a ledger account address (`sent1` + 38 characters).
pub const WALLET_ADDRESS_LEN: usize = 43;

const WALLET_SEQUENCE: &str = "wallets";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: u64,
    pub address: String,
    pub is_fee_granted: bool,
    pub created_at: DateTime<Utc>,
}

/// Canonical form of a wallet address used as the natural key.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Repository for wallet records.
pub struct WalletRepository<'a> {
    db: &'a Database,
}

impl<'a> WalletRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register a wallet that still needs a fee grant.
    ///
    /// # Returns
    /// - `Err(StoreError::AlreadyExists)` if the address is already known
    pub fn register(&self, address: &str) -> StoreResult<WalletRecord> {
        let address = normalize_address(address);
        let write_txn = self.db.inner().begin_write()?;
        let record = {
            let exists = {
                let wallets = write_txn.open_table(WALLETS)?;
                let found = wallets.get(address.as_str())?.is_some();
                found
            };
            if exists {
                return Err(StoreError::AlreadyExists(format!("Wallet {address}")));
            }

            let record = WalletRecord {
                id: next_id(&write_txn, WALLET_SEQUENCE)?,
                address,
                is_fee_granted: false,
                created_at: Utc::now(),
            };
            let json = encode(&record)?;
            let mut wallets = write_txn.open_table(WALLETS)?;
            wallets.insert(record.address.as_str(), json.as_slice())?;
            let mut pending = write_txn.open_table(PENDING_WALLETS)?;
            pending.insert(record.id, record.address.as_str())?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    pub fn find(&self, address: &str) -> StoreResult<Option<WalletRecord>> {
        let address = normalize_address(address);
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(WALLETS)?;
        match table.get(address.as_str())? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Up to `limit` wallets without a confirmed fee grant, newest first.
    pub fn list_pending(&self, limit: usize) -> StoreResult<Vec<WalletRecord>> {
        let read_txn = self.db.inner().begin_read()?;
        let pending = read_txn.open_table(PENDING_WALLETS)?;
        let wallets = read_txn.open_table(WALLETS)?;

        let mut result = Vec::new();
        for entry in pending.iter()?.rev() {
            if result.len() >= limit {
                break;
            }
            let (_, address) = entry?;
            match wallets.get(address.value())? {
                Some(value) => result.push(decode(value.value())?),
                None => tracing::warn!(
                    address = %address.value(),
                    "Pending wallet index points at a missing wallet"
                ),
            }
        }
        Ok(result)
    }

    /// Mark the given wallets as fee-granted in a single transaction.
    ///
    /// Unknown or already granted addresses are ignored. Returns the number
    /// of wallets that changed.
    pub fn mark_fee_granted(&self, addresses: &[String]) -> StoreResult<usize> {
        let write_txn = self.db.inner().begin_write()?;
        let mut changed = 0;
        {
            let mut wallets = write_txn.open_table(WALLETS)?;
            let mut pending = write_txn.open_table(PENDING_WALLETS)?;

            for address in addresses {
                let address = normalize_address(address);
                let existing = wallets.get(address.as_str())?.map(|v| v.value().to_vec());
                let Some(bytes) = existing else {
                    continue;
                };

                let mut record: WalletRecord = decode(&bytes)?;
                if record.is_fee_granted {
                    continue;
                }
                record.is_fee_granted = true;
                let json = encode(&record)?;
                wallets.insert(address.as_str(), json.as_slice())?;
                pending.remove(record.id)?;
                changed += 1;
            }
        }
        write_txn.commit()?;
        Ok(changed)
    }
}
