// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::{config::ApiSettings, error::ApiError, storage::Database};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    pub fn new(db: Arc<Database>, settings: ApiSettings) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
        }
    }

    /// Convert an error for the response, hiding the reason in production.
    pub fn reject(&self, error: impl Into<ApiError>) -> ApiError {
        error
            .into()
            .redacted(self.settings.environment.is_production())
    }
}
