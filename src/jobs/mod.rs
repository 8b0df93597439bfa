// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Background reconciliation against the node directory and the ledger.
//!
//! This module provides:
//! - Offset/limit pagination and chunked batch processing
//! - The node sync, wallet enrollment and purchase redemption reconcilers
//! - A single-flight interval scheduler

pub mod chunks;
pub mod enrollment;
pub mod nodes;
pub mod pagination;
pub mod redemption;
pub mod scheduler;

pub use chunks::{partition, process_batches, process_chunks, ChunkSummary};
pub use enrollment::{EnrollmentReport, WalletEnrollmentReconciler};
pub use nodes::{NodeReconciler, NodeSyncError, NodeSyncReport, NodeValidationError};
pub use pagination::fetch_all;
pub use redemption::{PurchaseRedemptionReconciler, RedemptionReport};
pub use scheduler::{Job, JobRunner};

use crate::sentinel::SentinelError;
use crate::storage::StoreError;

/// Failure of one chunk (or of loading a run's work set).
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error(transparent)]
    Ledger(#[from] SentinelError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
