// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-size batch processing with per-batch failure isolation.

use std::{fmt::Display, future::Future};

use tracing::warn;

/// Split `items` into consecutive chunks of `size` (the last may be shorter).
///
/// An empty input yields no chunks. A `size` of zero is treated as one.
pub fn partition<T>(items: &[T], size: usize) -> Vec<&[T]> {
    items.chunks(size.max(1)).collect()
}

/// Outcome counts of one [`process_chunks`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Run `handler` on each chunk of `items` in order.
///
/// A failing chunk is logged and skipped; later chunks still run. There is no
/// retry within a run.
pub async fn process_chunks<'a, T, E, F, Fut>(
    job: &str,
    items: &'a [T],
    size: usize,
    handler: F,
) -> ChunkSummary
where
    F: FnMut(usize, &'a [T]) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    process_batches(job, partition(items, size), handler).await
}

/// Like [`process_chunks`] for batches whose membership is already decided.
pub async fn process_batches<'a, T, E, F, Fut>(
    job: &str,
    batches: impl IntoIterator<Item = &'a [T]>,
    mut handler: F,
) -> ChunkSummary
where
    T: 'a,
    F: FnMut(usize, &'a [T]) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut summary = ChunkSummary::default();
    for (index, chunk) in batches.into_iter().enumerate() {
        match handler(index, chunk).await {
            Ok(()) => summary.succeeded += 1,
            Err(e) => {
                warn!(
                    job,
                    chunk = index,
                    chunk_len = chunk.len(),
                    error = %e,
                    "Chunk failed, continuing with the next one"
                );
                summary.failed += 1;
            }
        }
    }
    summary
}
