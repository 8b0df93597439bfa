// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Fee-Grant Enrollment
//!
//! Takes the newest wallets without a confirmed fee grant, checks the ledger
//! for an allowance each may already hold from the fee granter, and grants
//! the rest in one transaction per chunk. A chunk's wallets are marked only
//! after its transaction succeeds.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::{
    chunks::{process_chunks, ChunkSummary},
    pagination::fetch_all,
    scheduler::Job,
    ChunkError,
};
use crate::sentinel::{Ledger, SentinelError};
use crate::storage::{Database, WalletRecord, WalletRepository};

/// Wallets considered per run.
pub const ENROLLMENT_BATCH_LIMIT: usize = 1000;
/// Wallets per grant transaction.
pub const ENROLLMENT_CHUNK_SIZE: usize = 100;
/// Page size for allowance lookups.
pub const ALLOWANCE_PAGE_LIMIT: usize = 10_000;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrollmentReport {
    pub pending: usize,
    pub granted: usize,
    pub already_granted: usize,
    pub lookup_failed: usize,
    pub enrolled: usize,
    pub chunks: ChunkSummary,
}

#[derive(Default)]
struct Tally {
    granted: AtomicUsize,
    already_granted: AtomicUsize,
    lookup_failed: AtomicUsize,
    enrolled: AtomicUsize,
}

pub struct WalletEnrollmentReconciler {
    db: Arc<Database>,
    ledger: Arc<dyn Ledger>,
    granter: String,
}

impl WalletEnrollmentReconciler {
    pub fn new(db: Arc<Database>, ledger: Arc<dyn Ledger>, granter: impl Into<String>) -> Self {
        Self {
            db,
            ledger,
            granter: granter.into(),
        }
    }

    pub async fn enroll(&self) -> Result<EnrollmentReport, ChunkError> {
        let wallets = WalletRepository::new(&self.db).list_pending(ENROLLMENT_BATCH_LIMIT)?;
        if wallets.is_empty() {
            return Ok(EnrollmentReport::default());
        }

        let tally = Tally::default();
        let chunks = process_chunks(
            "wallet_enrollment",
            &wallets,
            ENROLLMENT_CHUNK_SIZE,
            |index, chunk| self.enroll_chunk(index, chunk, &tally),
        )
        .await;

        let report = EnrollmentReport {
            pending: wallets.len(),
            granted: tally.granted.load(Ordering::Relaxed),
            already_granted: tally.already_granted.load(Ordering::Relaxed),
            lookup_failed: tally.lookup_failed.load(Ordering::Relaxed),
            enrolled: tally.enrolled.load(Ordering::Relaxed),
            chunks,
        };
        info!(
            pending = report.pending,
            granted = report.granted,
            already_granted = report.already_granted,
            lookup_failed = report.lookup_failed,
            enrolled = report.enrolled,
            chunks_succeeded = report.chunks.succeeded,
            chunks_failed = report.chunks.failed,
            "Wallet enrollment pass complete"
        );
        Ok(report)
    }

    async fn enroll_chunk(
        &self,
        index: usize,
        chunk: &[WalletRecord],
        tally: &Tally,
    ) -> Result<(), ChunkError> {
        let mut to_grant = Vec::new();
        let mut enrolled = Vec::new();

        for wallet in chunk {
            match self.holds_grant(&wallet.address).await {
                Ok(true) => {
                    tally.already_granted.fetch_add(1, Ordering::Relaxed);
                    enrolled.push(wallet.address.clone());
                }
                Ok(false) => {
                    to_grant.push(wallet.address.clone());
                    enrolled.push(wallet.address.clone());
                }
                Err(e) => {
                    warn!(
                        address = %wallet.address,
                        error = %e,
                        "Failed to fetch fee grant allowances, retrying next run"
                    );
                    tally.lookup_failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        if to_grant.is_empty() {
            if !enrolled.is_empty() {
                info!(
                    chunk = index,
                    count = enrolled.len(),
                    "Wallets already hold a fee grant, enrolling without a transaction"
                );
            }
        } else {
            let tx = self.ledger.grant_fee(&to_grant).await?;
            info!(
                chunk = index,
                count = to_grant.len(),
                txhash = %tx.txhash,
                height = tx.height,
                "Granted fees to wallets"
            );
            tally.granted.fetch_add(to_grant.len(), Ordering::Relaxed);
        }

        if enrolled.is_empty() {
            return Ok(());
        }
        let marked = WalletRepository::new(&self.db).mark_fee_granted(&enrolled)?;
        tally.enrolled.fetch_add(marked, Ordering::Relaxed);
        Ok(())
    }

    /// Whether `address` already holds an allowance from the fee granter.
    async fn holds_grant(&self, address: &str) -> Result<bool, SentinelError> {
        let ledger = self.ledger.as_ref();
        let allowances = fetch_all(ALLOWANCE_PAGE_LIMIT, move |limit, offset| {
            ledger.fetch_allowances(address, limit, offset)
        })
        .await?;
        Ok(allowances.iter().any(|a| a.is_grant(address, &self.granter)))
    }
}

#[async_trait]
impl Job for WalletEnrollmentReconciler {
    fn name(&self) -> &'static str {
        "wallet_enrollment"
    }

    async fn run(&self) {
        if let Err(e) = self.enroll().await {
            error!(error = %e, "Failed to load wallets pending enrollment");
        }
    }
}
