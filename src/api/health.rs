// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use tracing::error;

use crate::{
    error::{ApiError, ErrorBody},
    models::{DataResponse, VersionResponse},
    state::AppState,
};

/// Health check endpoint handler.
///
/// Returns 200 when the store serves a read transaction.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Store check failed", body = ErrorBody)
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<DataResponse<()>>, ApiError> {
    if let Err(e) = state.db.health_check() {
        error!(error = %e, "Error checking database health");
        return Err(state.reject(ApiError::unknown("Error checking database health")));
    }
    Ok(Json(DataResponse::empty()))
}

/// Latest client versions, used by the apps to prompt for updates.
#[utoipa::path(
    get,
    path = "/version",
    tag = "Health",
    responses(
        (status = 200, description = "Latest client versions, wrapped in `data`", body = VersionResponse)
    )
)]
pub async fn version(State(state): State<AppState>) -> Json<DataResponse<VersionResponse>> {
    Json(DataResponse::new(VersionResponse {
        ios: state.settings.last_ios_version.clone(),
        android: state.settings.last_android_version.clone(),
    }))
}
