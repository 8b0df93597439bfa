// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Purchase Redemption
//!
//! Pays out unredeemed in-app purchases as token transfers, one transaction
//! per chunk. Each transfer carries a memo derived from the chunk's event ids
//! so a retried chunk is recognizable on chain.
//!
//! A chunk whose transfer fails is held with its memo. The next run submits
//! held chunks first, unchanged, and only then cuts new chunks from the
//! remaining purchases, so purchases arriving in between never reshuffle a
//! retried chunk.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use super::{
    chunks::{partition, process_batches, ChunkSummary},
    scheduler::Job,
    ChunkError,
};
use crate::sentinel::Ledger;
use crate::storage::{Database, PurchaseRecord, PurchaseRepository};

/// Purchases considered per run.
pub const REDEMPTION_BATCH_LIMIT: usize = 100;
/// Purchases per transfer transaction.
pub const REDEMPTION_CHUNK_SIZE: usize = 10;

const MEMO_PREFIX: &str = "redeem:";
const MEMO_DIGEST_CHARS: usize = 32;

/// Transfer memo for a chunk: stable for the same set of event ids.
pub fn redemption_memo(chunk: &[PurchaseRecord]) -> String {
    let mut event_ids: Vec<&str> = chunk.iter().map(|p| p.event_id.as_str()).collect();
    event_ids.sort_unstable();

    let digest = hex::encode(Sha256::digest(event_ids.join(",").as_bytes()));
    format!("{MEMO_PREFIX}{}", &digest[..MEMO_DIGEST_CHARS])
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedemptionReport {
    pub pending: usize,
    /// Previously failed chunks submitted again this run.
    pub resubmitted: usize,
    pub chunks: ChunkSummary,
}

/// One transfer to submit: its memo and members.
struct Transfer {
    memo: String,
    purchases: Vec<PurchaseRecord>,
    /// Carried over from an earlier failed run.
    held: bool,
}

pub struct PurchaseRedemptionReconciler {
    db: Arc<Database>,
    ledger: Arc<dyn Ledger>,
}

impl PurchaseRedemptionReconciler {
    pub fn new(db: Arc<Database>, ledger: Arc<dyn Ledger>) -> Self {
        Self { db, ledger }
    }

    pub async fn redeem(&self) -> Result<RedemptionReport, ChunkError> {
        let transfers = self.plan()?;
        if transfers.is_empty() {
            return Ok(RedemptionReport::default());
        }
        let pending: usize = transfers.iter().map(|t| t.purchases.len()).sum();
        let resubmitted = transfers.iter().filter(|t| t.held).count();

        let chunks = process_batches(
            "purchase_redemption",
            transfers
                .iter()
                .map(|t| t.purchases.as_slice())
                .collect::<Vec<_>>(),
            |index, chunk| self.redeem_chunk(index, &transfers[index].memo, chunk),
        )
        .await;

        info!(
            pending,
            resubmitted,
            chunks_succeeded = chunks.succeeded,
            chunks_failed = chunks.failed,
            "Purchase redemption pass complete"
        );
        Ok(RedemptionReport {
            pending,
            resubmitted,
            chunks,
        })
    }

    /// Held chunks first, then fresh chunks of the newest other purchases.
    fn plan(&self) -> Result<Vec<Transfer>, ChunkError> {
        let repo = PurchaseRepository::new(&self.db);

        let mut transfers: Vec<Transfer> = repo
            .held_batches()?
            .into_iter()
            .map(|batch| Transfer {
                memo: batch.memo,
                purchases: batch.purchases,
                held: true,
            })
            .collect();

        let held: HashSet<String> = transfers
            .iter()
            .flat_map(|t| t.purchases.iter().map(|p| p.event_id.clone()))
            .collect();
        let fresh: Vec<PurchaseRecord> = repo
            .list_unredeemed(REDEMPTION_BATCH_LIMIT)?
            .into_iter()
            .filter(|p| !held.contains(&p.event_id))
            .collect();

        for chunk in partition(&fresh, REDEMPTION_CHUNK_SIZE) {
            transfers.push(Transfer::fresh(chunk));
        }
        Ok(transfers)
    }

    async fn redeem_chunk(
        &self,
        index: usize,
        memo: &str,
        chunk: &[PurchaseRecord],
    ) -> Result<(), ChunkError> {
        let addresses: Vec<String> = chunk.iter().map(|p| p.address.clone()).collect();
        let amounts: Vec<String> = chunk
            .iter()
            .map(|p| format!("{}{}", p.amount, p.denom))
            .collect();
        let event_ids: Vec<String> = chunk.iter().map(|p| p.event_id.clone()).collect();
        let repo = PurchaseRepository::new(&self.db);

        let tx = match self.ledger.send_tokens(&addresses, &amounts, memo).await {
            Ok(tx) => tx,
            Err(e) => {
                if let Err(hold_err) = repo.hold_batch(memo, &event_ids) {
                    warn!(%memo, error = %hold_err, "Failed to hold chunk for resubmission");
                }
                return Err(e.into());
            }
        };
        info!(
            chunk = index,
            count = chunk.len(),
            %memo,
            txhash = %tx.txhash,
            height = tx.height,
            "Sent tokens for purchases"
        );

        repo.settle_batch(memo, &event_ids).map_err(|e| {
            error!(
                txhash = %tx.txhash,
                %memo,
                error = %e,
                "Tokens sent but purchases could not be marked redeemed"
            );
            ChunkError::from(e)
        })?;
        Ok(())
    }
}

impl Transfer {
    fn fresh(chunk: &[PurchaseRecord]) -> Self {
        Self {
            memo: redemption_memo(chunk),
            purchases: chunk.to_vec(),
            held: false,
        }
    }
}

#[async_trait]
impl Job for PurchaseRedemptionReconciler {
    fn name(&self) -> &'static str {
        "purchase_redemption"
    }

    async fn run(&self) {
        if let Err(e) = self.redeem().await {
            error!(error = %e, "Failed to load unredeemed purchases");
        }
    }
}
