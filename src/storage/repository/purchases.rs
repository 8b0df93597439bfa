// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-app purchases waiting to be redeemed as token transfers.
//!
//! The purchase event id from the billing webhook is the natural key, so a
//! redelivered webhook never creates a second purchase.
//!
//! A chunk whose transfer failed is held under its memo until a retry
//! succeeds, so the retry pays exactly the same purchases under the same memo.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};

use super::wallets::normalize_address;
use crate::storage::database::{
    decode, encode, next_id, Database, StoreError, StoreResult, PURCHASES, REDEMPTION_BATCHES,
    UNREDEEMED_PURCHASES,
};

const PURCHASE_SEQUENCE: &str = "purchases";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: u64,
    pub event_id: String,
    /// Recipient wallet address.
    pub address: String,
    /// Amount in the smallest unit of `denom`.
    pub amount: i64,
    pub denom: String,
    pub is_redeemed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub event_id: String,
    pub address: String,
    pub amount: i64,
    pub denom: String,
}

/// A failed transfer chunk awaiting resubmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldBatch {
    pub memo: String,
    /// Members that are still unredeemed, in the order they were held.
    pub purchases: Vec<PurchaseRecord>,
}

pub struct PurchaseRepository<'a> {
    db: &'a Database,
}

impl<'a> PurchaseRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record a purchase.
    ///
    /// # Returns
    /// - `Err(StoreError::AlreadyExists)` if the event id was already recorded
    pub fn create(&self, purchase: NewPurchase) -> StoreResult<PurchaseRecord> {
        let write_txn = self.db.inner().begin_write()?;
        let record = {
            let exists = {
                let purchases = write_txn.open_table(PURCHASES)?;
                let found = purchases.get(purchase.event_id.as_str())?.is_some();
                found
            };
            if exists {
                return Err(StoreError::AlreadyExists(format!(
                    "Purchase event {}",
                    purchase.event_id
                )));
            }

            let record = PurchaseRecord {
                id: next_id(&write_txn, PURCHASE_SEQUENCE)?,
                event_id: purchase.event_id,
                address: normalize_address(&purchase.address),
                amount: purchase.amount,
                denom: purchase.denom,
                is_redeemed: false,
                created_at: Utc::now(),
            };
            let json = encode(&record)?;
            let mut purchases = write_txn.open_table(PURCHASES)?;
            purchases.insert(record.event_id.as_str(), json.as_slice())?;
            let mut unredeemed = write_txn.open_table(UNREDEEMED_PURCHASES)?;
            unredeemed.insert(record.id, record.event_id.as_str())?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    pub fn find(&self, event_id: &str) -> StoreResult<Option<PurchaseRecord>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(PURCHASES)?;
        match table.get(event_id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Up to `limit` unredeemed purchases, newest first.
    pub fn list_unredeemed(&self, limit: usize) -> StoreResult<Vec<PurchaseRecord>> {
        let read_txn = self.db.inner().begin_read()?;
        let unredeemed = read_txn.open_table(UNREDEEMED_PURCHASES)?;
        let purchases = read_txn.open_table(PURCHASES)?;

        let mut result = Vec::new();
        for entry in unredeemed.iter()?.rev() {
            if result.len() >= limit {
                break;
            }
            let (_, event_id) = entry?;
            if let Some(value) = purchases.get(event_id.value())? {
                result.push(decode(value.value())?);
            }
        }
        Ok(result)
    }

    /// Mark the given purchases redeemed in one transaction.
    ///
    /// Returns the number of purchases that changed.
    pub fn mark_redeemed(&self, event_ids: &[String]) -> StoreResult<usize> {
        let write_txn = self.db.inner().begin_write()?;
        let changed = mark_redeemed_in(&write_txn, event_ids)?;
        write_txn.commit()?;
        Ok(changed)
    }

    /// Remember the members of a chunk whose transfer failed.
    pub fn hold_batch(&self, memo: &str, event_ids: &[String]) -> StoreResult<()> {
        let json = encode(&event_ids)?;
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut batches = write_txn.open_table(REDEMPTION_BATCHES)?;
            batches.insert(memo, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Held batches with their still unredeemed members, in memo order.
    ///
    /// Batches with no unredeemed member left are skipped.
    pub fn held_batches(&self) -> StoreResult<Vec<HeldBatch>> {
        let read_txn = self.db.inner().begin_read()?;
        let batches = read_txn.open_table(REDEMPTION_BATCHES)?;
        let purchases = read_txn.open_table(PURCHASES)?;

        let mut held = Vec::new();
        for entry in batches.iter()? {
            let (memo, value) = entry?;
            let event_ids: Vec<String> = decode(value.value())?;

            let mut members = Vec::new();
            for event_id in &event_ids {
                if let Some(value) = purchases.get(event_id.as_str())? {
                    let record: PurchaseRecord = decode(value.value())?;
                    if !record.is_redeemed {
                        members.push(record);
                    }
                }
            }
            if !members.is_empty() {
                held.push(HeldBatch {
                    memo: memo.value().to_string(),
                    purchases: members,
                });
            }
        }
        Ok(held)
    }

    /// Mark a chunk redeemed and drop its held batch, in one transaction.
    ///
    /// Returns the number of purchases that changed.
    pub fn settle_batch(&self, memo: &str, event_ids: &[String]) -> StoreResult<usize> {
        let write_txn = self.db.inner().begin_write()?;
        let changed = mark_redeemed_in(&write_txn, event_ids)?;
        {
            let mut batches = write_txn.open_table(REDEMPTION_BATCHES)?;
            batches.remove(memo)?;
        }
        write_txn.commit()?;
        Ok(changed)
    }
}

fn mark_redeemed_in(write_txn: &WriteTransaction, event_ids: &[String]) -> StoreResult<usize> {
    let mut purchases = write_txn.open_table(PURCHASES)?;
    let mut unredeemed = write_txn.open_table(UNREDEEMED_PURCHASES)?;

    let mut changed = 0;
    for event_id in event_ids {
        let existing = purchases
            .get(event_id.as_str())?
            .map(|v| v.value().to_vec());
        let Some(bytes) = existing else {
            continue;
        };

        let mut record: PurchaseRecord = decode(&bytes)?;
        if record.is_redeemed {
            continue;
        }
        record.is_redeemed = true;
        let json = encode(&record)?;
        purchases.insert(event_id.as_str(), json.as_slice())?;
        unredeemed.remove(record.id)?;
        changed += 1;
    }
    Ok(changed)
}
