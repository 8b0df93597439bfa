// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Plan Wizard node directory integration.
//!
//! The directory is the system of record for which relay nodes belong to the
//! configured plan. This module only fetches pages of node descriptors; the
//! node reconciler in [`crate::jobs`] decides what to do with them.

pub mod client;
pub mod types;

pub use client::{NodeDirectory, PlanWizardClient, PlanWizardError};
pub use types::{NodeDescriptor, NodePrice};
