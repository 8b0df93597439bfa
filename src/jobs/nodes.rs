// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Node Directory Sync
//!
//! Mirrors the plan's node list from Plan Wizard into the `servers` table.
//!
//! ## Pass
//!
//! 1. Fetch every node page (a fetch failure aborts the pass untouched).
//! 2. Allocate one revision stamp for the pass.
//! 3. Validate each node and upsert it by address with the pass stamp.
//!    Invalid nodes are logged and skipped.
//! 4. Deactivate every active server whose revision is not the pass stamp.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::{pagination::fetch_all, scheduler::Job};
use crate::planwizard::{NodeDescriptor, NodeDirectory, NodePrice, PlanWizardError};
use crate::storage::{
    Database, GeoRepository, ServerConfiguration, ServerDraft, ServerProtocol, ServerRepository,
    StoreError, UpsertOutcome,
};

/// Page size used against the directory.
pub const NODE_PAGE_LIMIT: usize = 15_000;

/// Why a single node was skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NodeValidationError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("unknown protocol type {0}")]
    UnknownProtocol(i64),

    #[error("max_peers must be positive")]
    ZeroMaxPeers,

    #[error("unknown country `{0}`")]
    UnknownCountry(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NodeSyncError {
    #[error("failed to fetch nodes: {0}")]
    Fetch(#[from] PlanWizardError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
enum NodeError {
    #[error(transparent)]
    Invalid(#[from] NodeValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A node that passed validation but whose location is not yet resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedNode {
    pub address: String,
    pub name: String,
    pub protocol: ServerProtocol,
    pub current_load: f64,
    pub country: String,
    pub city: String,
    pub configuration: ServerConfiguration,
}

/// Counts for one sync pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeSyncReport {
    pub revision: i64,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    /// `None` when the deactivation step failed.
    pub deactivated: Option<usize>,
}

fn protocol_for(code: i64) -> Result<ServerProtocol, NodeValidationError> {
    match code {
        1 => Ok(ServerProtocol::WireGuard),
        2 => Ok(ServerProtocol::V2Ray),
        other => Err(NodeValidationError::UnknownProtocol(other)),
    }
}

fn required<T: Clone>(value: &Option<T>, field: &'static str) -> Result<T, NodeValidationError> {
    value.clone().ok_or(NodeValidationError::MissingField(field))
}

/// Validate and transform one directory node.
///
/// Prices not quoted in `denom` are stored as zero.
pub fn validate_node(
    node: &NodeDescriptor,
    denom: &str,
) -> Result<ValidatedNode, NodeValidationError> {
    let protocol = protocol_for(required(&node.node_type, "type")?)?;
    let name = required(&node.moniker, "moniker")?;
    let bandwidth_upload = required(&node.bandwidth_upload, "bandwidth_upload")?;
    let bandwidth_download = required(&node.bandwidth_download, "bandwidth_download")?;
    let city = required(&node.location_city, "location_city")?;
    let country = required(&node.location_country, "location_country")?;
    let location_lat = required(&node.location_lat, "location_lat")?;
    let location_lon = required(&node.location_lon, "location_lon")?;
    let version = required(&node.version, "version")?;
    let peers = required(&node.peers, "peers")?;
    let max_peers = required(&node.max_peers, "max_peers")?;

    if max_peers <= 0 {
        return Err(NodeValidationError::ZeroMaxPeers);
    }
    let current_load = (peers as f64 / max_peers as f64).clamp(0.0, 1.0);

    let price_in = |prices: &[NodePrice]| {
        prices
            .iter()
            .find(|p| p.denom == denom)
            .map(|p| p.amount)
            .unwrap_or(0)
    };

    Ok(ValidatedNode {
        address: node.address.clone(),
        name,
        protocol,
        current_load,
        configuration: ServerConfiguration {
            remote_url: node.remote_url.clone(),
            bandwidth_download,
            bandwidth_upload,
            location_city: city.clone(),
            location_country: country.clone(),
            location_lat,
            location_lon,
            price_per_gb: price_in(&node.gigabyte_prices),
            price_per_hour: price_in(&node.hourly_prices),
            version,
        },
        country,
        city,
    })
}

/// Reconciles the plan's node list into local server records.
pub struct NodeReconciler {
    db: Arc<Database>,
    directory: Arc<dyn NodeDirectory>,
    denom: String,
}

impl NodeReconciler {
    pub fn new(
        db: Arc<Database>,
        directory: Arc<dyn NodeDirectory>,
        denom: impl Into<String>,
    ) -> Self {
        Self {
            db,
            directory,
            denom: denom.into(),
        }
    }

    /// Run one full pass.
    pub async fn sync(&self) -> Result<NodeSyncReport, NodeSyncError> {
        let directory = self.directory.as_ref();
        let nodes = fetch_all(NODE_PAGE_LIMIT, move |limit, offset| {
            directory.fetch_nodes(limit, offset)
        })
        .await?;
        info!(count = nodes.len(), "Fetched nodes from Plan Wizard");

        let servers = ServerRepository::new(&self.db);
        let revision = servers.allocate_revision(Utc::now().timestamp_millis())?;

        let mut report = NodeSyncReport {
            revision,
            fetched: nodes.len(),
            ..Default::default()
        };

        for node in &nodes {
            match self.reconcile_node(node, revision) {
                Ok(UpsertOutcome::Created) => {
                    debug!(address = %node.address, "Created server");
                    report.created += 1;
                }
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Err(NodeError::Invalid(e)) => {
                    warn!(address = %node.address, error = %e, "Skipping invalid node");
                    report.skipped += 1;
                }
                Err(NodeError::Store(e)) => {
                    error!(address = %node.address, error = %e, "Failed to store server");
                    report.skipped += 1;
                }
            }
        }

        match servers.deactivate_stale(revision) {
            Ok(count) => report.deactivated = Some(count),
            Err(e) => error!(revision, error = %e, "Failed to deactivate stale servers"),
        }

        info!(
            revision,
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            deactivated = ?report.deactivated,
            "Node sync pass complete"
        );
        Ok(report)
    }

    fn reconcile_node(
        &self,
        node: &NodeDescriptor,
        revision: i64,
    ) -> Result<UpsertOutcome, NodeError> {
        let valid = validate_node(node, &self.denom)?;

        let geo = GeoRepository::new(&self.db);
        let country = geo
            .find_country_by_name(&valid.country)?
            .ok_or_else(|| NodeValidationError::UnknownCountry(valid.country.clone()))?;
        let (city, created) = geo.resolve_city(country.id, &valid.city)?;
        if created {
            info!(city = %city.name, country = %country.name, "Created city");
        }

        let draft = ServerDraft {
            address: valid.address,
            name: valid.name,
            country_id: country.id,
            city_id: city.id,
            protocol: valid.protocol,
            current_load: valid.current_load,
            configuration: valid.configuration,
        };
        Ok(ServerRepository::new(&self.db).upsert(&draft, revision)?)
    }
}

#[async_trait]
impl Job for NodeReconciler {
    fn name(&self) -> &'static str {
        "node_sync"
    }

    async fn run(&self) {
        if let Err(e) = self.sync().await {
            error!(error = %e, "Node sync pass aborted");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::storage::database::tests::temp_db;
    use crate::storage::repository::geo::tests::seeds;

    /// Directory serving a fixed node list, or failing every call.
    pub(crate) struct FakeDirectory {
        pub nodes: Mutex<Vec<NodeDescriptor>>,
        pub fail: bool,
    }

    impl FakeDirectory {
        pub(crate) fn new(nodes: Vec<NodeDescriptor>) -> Self {
            Self {
                nodes: Mutex::new(nodes),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl NodeDirectory for FakeDirectory {
        async fn fetch_nodes(
            &self,
            limit: usize,
            offset: usize,
        ) -> Result<Option<Vec<NodeDescriptor>>, PlanWizardError> {
            if self.fail {
                return Err(PlanWizardError::Request("connection refused".into()));
            }
            let nodes = self.nodes.lock().unwrap();
            Ok(Some(nodes.iter().skip(offset).take(limit).cloned().collect()))
        }
    }

    pub(crate) fn node(address: &str) -> NodeDescriptor {
        NodeDescriptor {
            address: address.to_string(),
            remote_url: format!("https://{address}.example:8585"),
            gigabyte_prices: vec![
                NodePrice {
                    denom: "ibc/31FEE1A2".into(),
                    amount: 15,
                },
                NodePrice {
                    denom: "udvpn".into(),
                    amount: 4_160_000,
                },
            ],
            hourly_prices: vec![],
            moniker: Some(format!("moniker-{address}")),
            bandwidth_upload: Some(10_000_000),
            bandwidth_download: Some(50_000_000),
            location_city: Some("Berlin".into()),
            location_country: Some("Germany".into()),
            location_lat: Some(52.52),
            location_lon: Some(13.40),
            peers: Some(3),
            max_peers: Some(12),
            node_type: Some(1),
            version: Some("0.7.1".into()),
        }
    }

    fn reconciler(db: Arc<Database>, directory: FakeDirectory) -> NodeReconciler {
        NodeReconciler::new(db, Arc::new(directory), "udvpn")
    }

    fn seeded_db() -> (Arc<Database>, tempfile::TempDir) {
        let (db, dir) = temp_db();
        GeoRepository::new(&db).seed_countries(&seeds()).unwrap();
        (Arc::new(db), dir)
    }

    #[test]
    fn validate_extracts_native_prices_and_load() {
        let valid = validate_node(&node("a"), "udvpn").unwrap();
        assert_eq!(valid.protocol, ServerProtocol::WireGuard);
        assert_eq!(valid.configuration.price_per_gb, 4_160_000);
        assert_eq!(valid.configuration.price_per_hour, 0);
        assert!((valid.current_load - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_clamps_load_and_rejects_bad_nodes() {
        let mut crowded = node("a");
        crowded.peers = Some(40);
        assert_eq!(validate_node(&crowded, "udvpn").unwrap().current_load, 1.0);

        let mut v2ray = node("a");
        v2ray.node_type = Some(2);
        assert_eq!(validate_node(&v2ray, "udvpn").unwrap().protocol, ServerProtocol::V2Ray);

        let mut unknown = node("a");
        unknown.node_type = Some(3);
        assert_eq!(
            validate_node(&unknown, "udvpn"),
            Err(NodeValidationError::UnknownProtocol(3))
        );

        let mut zero = node("a");
        zero.max_peers = Some(0);
        assert_eq!(validate_node(&zero, "udvpn"), Err(NodeValidationError::ZeroMaxPeers));

        let mut anonymous = node("a");
        anonymous.moniker = None;
        assert_eq!(
            validate_node(&anonymous, "udvpn"),
            Err(NodeValidationError::MissingField("moniker"))
        );
    }

    #[tokio::test]
    async fn second_identical_pass_changes_nothing_but_revision() {
        let (db, _dir) = seeded_db();
        let job = reconciler(db.clone(), FakeDirectory::new(vec![node("a"), node("b")]));

        let first = job.sync().await.unwrap();
        assert_eq!(first.created, 2);
        let before = ServerRepository::new(&db).list_all().unwrap();

        let second = job.sync().await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 2);
        assert_eq!(second.deactivated, Some(0));
        assert!(second.revision > first.revision);

        let after = ServerRepository::new(&db).list_all().unwrap();
        assert_eq!(after.len(), 2);
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.id, a.id);
            assert_eq!(b.address, a.address);
            assert_eq!(b.configuration, a.configuration);
            assert_eq!(b.current_load, a.current_load);
            assert!(a.is_active);
        }
    }

    #[tokio::test]
    async fn node_missing_from_next_pass_is_deactivated() {
        let (db, _dir) = seeded_db();
        let directory = Arc::new(FakeDirectory::new(vec![node("a"), node("b")]));
        let job = NodeReconciler::new(db.clone(), directory.clone(), "udvpn");

        let first = job.sync().await.unwrap();
        *directory.nodes.lock().unwrap() = vec![node("a")];
        let second = job.sync().await.unwrap();
        assert_eq!(second.deactivated, Some(1));

        let servers = ServerRepository::new(&db);
        let gone = servers.find("b").unwrap().unwrap();
        assert!(!gone.is_active);
        assert_eq!(gone.revision, first.revision);
        assert!(servers.find("a").unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn invalid_nodes_are_skipped_and_stale_ones_still_deactivated() {
        let (db, _dir) = seeded_db();
        let directory = Arc::new(FakeDirectory::new(vec![node("old")]));
        let job = NodeReconciler::new(db.clone(), directory.clone(), "udvpn");
        job.sync().await.unwrap();

        let mut bad_type = node("bad");
        bad_type.node_type = Some(9);
        let mut nowhere = node("nowhere");
        nowhere.location_country = Some("Atlantis".into());
        *directory.nodes.lock().unwrap() = vec![node("x"), bad_type, node("y"), nowhere];

        let report = job.sync().await.unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.deactivated, Some(1));

        let servers = ServerRepository::new(&db);
        assert!(servers.find("bad").unwrap().is_none());
        assert!(!servers.find("old").unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_store_untouched() {
        let (db, _dir) = seeded_db();
        let directory = Arc::new(FakeDirectory::new(vec![node("a")]));
        NodeReconciler::new(db.clone(), directory, "udvpn")
            .sync()
            .await
            .unwrap();

        let failing = FakeDirectory {
            nodes: Mutex::new(Vec::new()),
            fail: true,
        };
        let err = reconciler(db.clone(), failing).sync().await.unwrap_err();
        assert!(matches!(err, NodeSyncError::Fetch(_)));
        assert!(ServerRepository::new(&db).find("a").unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn new_city_is_created_once() {
        let (db, _dir) = seeded_db();
        let mut munich = node("m");
        munich.location_city = Some("Munich".into());
        let job = reconciler(db.clone(), FakeDirectory::new(vec![node("a"), munich, node("b")]));
        job.sync().await.unwrap();

        let cities = GeoRepository::new(&db).cities_with_servers(1, None).unwrap();
        let names: Vec<(&str, usize)> = cities.iter().map(|(c, n)| (c.name.as_str(), *n)).collect();
        assert_eq!(names, vec![("Berlin", 2), ("Munich", 1)]);
    }
}
