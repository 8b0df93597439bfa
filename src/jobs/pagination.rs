// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Offset/limit full-collection retrieval.

use std::future::Future;

/// Fetch every page of a remote collection.
///
/// `fetch_page(limit, offset)` is called with offsets `0, limit, 2*limit, ...`
/// until it returns `None` or a page shorter than `limit`. The first error
/// aborts the scan and no partial result is returned.
pub async fn fetch_all<T, E, F, Fut>(limit: usize, mut fetch_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Option<Vec<T>>, E>>,
{
    let limit = limit.max(1);
    let mut items = Vec::new();
    let mut offset = 0;

    loop {
        let Some(page) = fetch_page(limit, offset).await? else {
            return Ok(items);
        };
        let is_last = page.len() < limit;
        items.extend(page);
        if is_last {
            return Ok(items);
        }
        offset += limit;
    }
}
