// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP error envelope.
//!
//! Errors render as `{"error": "<kind>", "reason": "<text>"}`. The reason is
//! dropped in production so internal details never reach clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::storage::StoreError;

/// Error category exposed to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    Unknown,
    InvalidRequest,
    NotFound,
}

impl ApiErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::Unknown => "unknownError",
            Self::InvalidRequest => "invalidRequest",
            Self::NotFound => "notFound",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            Self::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub reason: String,
    /// Whether `reason` may be included in the response body.
    pub expose_reason: bool,
}

/// Body of an error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            expose_reason: true,
        }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unknown, reason)
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidRequest, reason)
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, reason)
    }

    /// Hide the reason from the response body.
    pub fn redacted(mut self, redact: bool) -> Self {
        self.expose_reason = !redact;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::not_found(format!("{what} not found")),
            other => {
                tracing::error!(error = %other, "store failure while serving request");
                Self::unknown(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.kind.code().to_string(),
            reason: self.expose_reason.then_some(self.reason),
        });
        (self.kind.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_kind_and_reason() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status(), StatusCode::NOT_FOUND);
        assert_eq!(nf.reason, "missing");

        let bad = ApiError::invalid_request("bad");
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let unknown = ApiError::unknown("boom");
        assert_eq!(unknown.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: ApiError = StoreError::NotFound("Country 7".into()).into();
        assert_eq!(err.kind, ApiErrorKind::NotFound);
    }

    #[tokio::test]
    async fn into_response_returns_envelope() {
        let response = ApiError::invalid_request("invalid wallet address").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(
            body,
            r#"{"error":"invalidRequest","reason":"invalid wallet address"}"#
        );
    }

    #[tokio::test]
    async fn redacted_response_omits_reason() {
        let response = ApiError::unknown("db exploded").redacted(true).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"unknownError"}"#);
    }
}
