// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the Plan Wizard node directory.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::types::{NodeDescriptor, PlanWizardEnvelope};
use crate::config::PlanWizardConfig;

#[derive(Debug, thiserror::Error)]
pub enum PlanWizardError {
    #[error("Plan Wizard request failed: {0}")]
    Request(String),

    #[error("Plan Wizard response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Plan Wizard returned an error: {error}: {reason}")]
    Api { error: String, reason: String },
}

/// Source of node descriptors, one page at a time.
///
/// `Ok(None)` means the directory returned no data for the page.
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    async fn fetch_nodes(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Option<Vec<NodeDescriptor>>, PlanWizardError>;
}

#[derive(Debug, Clone)]
pub struct PlanWizardClient {
    api_endpoint: Url,
    plan_id: i64,
    http: Client,
}

impl PlanWizardClient {
    pub fn new(config: &PlanWizardConfig, timeout: Duration) -> Result<Self, PlanWizardError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlanWizardError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_endpoint: config.api_endpoint.clone(),
            plan_id: config.plan_id,
            http,
        })
    }

    fn nodes_url(&self) -> String {
        format!(
            "{}/plans/{}/nodes",
            self.api_endpoint.as_str().trim_end_matches('/'),
            self.plan_id
        )
    }
}

#[async_trait]
impl NodeDirectory for PlanWizardClient {
    async fn fetch_nodes(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Option<Vec<NodeDescriptor>>, PlanWizardError> {
        let url = self.nodes_url();
        debug!(%url, limit, offset, "Fetching plan nodes");

        let response = self
            .http
            .get(&url)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await
            .map_err(|e| PlanWizardError::Request(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlanWizardError::Request(format!("GET {url} body read failed: {e}")))?;

        // The directory reports application errors inside the envelope, so
        // only give up on the status code when the body is not an envelope.
        let envelope: PlanWizardEnvelope<Vec<NodeDescriptor>> = serde_json::from_str(&body)
            .map_err(|e| {
                if status.is_success() {
                    PlanWizardError::InvalidResponse(format!("GET {url} invalid JSON: {e}"))
                } else {
                    PlanWizardError::Request(format!("GET {url} returned {status}: {body}"))
                }
            })?;

        if !envelope.error.is_empty() {
            return Err(PlanWizardError::Api {
                error: envelope.error,
                reason: envelope.reason,
            });
        }

        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        extract::{Path, Query},
        http::StatusCode,
        routing::get,
        Json, Router,
    };
    use serde_json::json;

    use super::*;
    use crate::test_util::spawn_stub;

    async fn client_for(router: Router) -> PlanWizardClient {
        let api_endpoint = spawn_stub(router).await;
        let config = PlanWizardConfig {
            api_endpoint,
            plan_id: 42,
        };
        PlanWizardClient::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetch_nodes_sends_plan_and_paging() {
        let router = Router::new().route(
            "/plans/{id}/nodes",
            get(
                |Path(id): Path<i64>, Query(q): Query<HashMap<String, String>>| async move {
                    Json(json!({
                        "error": "",
                        "reason": "",
                        "data": [{
                            "address": format!("node-{id}-{}-{}", q["limit"], q["offset"]),
                            "remote_url": "https://1.2.3.4:8585",
                            "type": 1
                        }]
                    }))
                },
            ),
        );
        let client = client_for(router).await;

        let nodes = client.fetch_nodes(10, 20).await.unwrap().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].address, "node-42-10-20");
        assert_eq!(nodes[0].node_type, Some(1));
    }

    #[tokio::test]
    async fn null_data_is_none() {
        let router = Router::new().route(
            "/plans/{id}/nodes",
            get(|| async { Json(json!({"error": "", "reason": "", "data": null})) }),
        );
        let client = client_for(router).await;
        assert!(client.fetch_nodes(10, 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn envelope_error_is_a_failure() {
        let router = Router::new().route(
            "/plans/{id}/nodes",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalidRequest", "reason": "bad plan"})),
                )
            }),
        );
        let client = client_for(router).await;

        let err = client.fetch_nodes(10, 0).await.unwrap_err();
        match err {
            PlanWizardError::Api { error, reason } => {
                assert_eq!(error, "invalidRequest");
                assert_eq!(reason, "bad plan");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_status_is_request_failure() {
        let router = Router::new().route(
            "/plans/{id}/nodes",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let client = client_for(router).await;
        let err = client.fetch_nodes(10, 0).await.unwrap_err();
        assert!(matches!(err, PlanWizardError::Request(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_failure() {
        let config = PlanWizardConfig {
            api_endpoint: Url::parse("http://127.0.0.1:1").unwrap(),
            plan_id: 1,
        };
        let client = PlanWizardClient::new(&config, Duration::from_secs(2)).unwrap();
        let err = client.fetch_nodes(10, 0).await.unwrap_err();
        assert!(matches!(err, PlanWizardError::Request(_)));
    }
}
