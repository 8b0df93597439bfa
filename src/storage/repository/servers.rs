// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relay server records.
//!
//! Servers are keyed by their on-chain node address. Records are never
//! deleted: a server missing from the directory is only deactivated.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{decode, encode, next_id, Database, StoreResult, META, SERVERS};

const SERVER_SEQUENCE: &str = "servers";
const REVISION_KEY: &str = "revision";

/// VPN protocol spoken by a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ServerProtocol {
    #[serde(rename = "WIREGUARD")]
    WireGuard,
    #[serde(rename = "V2RAY")]
    V2Ray,
}

impl ServerProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WireGuard => "WIREGUARD",
            Self::V2Ray => "V2RAY",
        }
    }
}

impl fmt::Display for ServerProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WIREGUARD" => Ok(Self::WireGuard),
            "V2RAY" => Ok(Self::V2Ray),
            other => Err(format!("unknown protocol `{other}`")),
        }
    }
}

/// Opaque connection details stored alongside a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfiguration {
    #[serde(rename = "remoteURL")]
    pub remote_url: String,
    pub bandwidth_download: i64,
    pub bandwidth_upload: i64,
    pub location_city: String,
    pub location_country: String,
    pub location_lat: f64,
    pub location_lon: f64,
    #[serde(rename = "pricePerGB")]
    pub price_per_gb: i64,
    pub price_per_hour: i64,
    pub version: String,
}

/// A relay server as persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: u64,
    pub address: String,
    pub country_id: u64,
    pub city_id: u64,
    pub name: String,
    pub protocol: ServerProtocol,
    /// Connected peers over capacity, within `[0, 1]`.
    pub current_load: f64,
    pub configuration: ServerConfiguration,
    pub is_active: bool,
    pub is_banned: bool,
    /// Stamp of the last node sync pass that observed this address.
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable server fields produced by a node sync pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDraft {
    pub address: String,
    pub name: String,
    pub country_id: u64,
    pub city_id: u64,
    pub protocol: ServerProtocol,
    pub current_load: f64,
    pub configuration: ServerConfiguration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Ordering applied to server listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerSort {
    #[default]
    Id,
    /// Highest load first.
    CurrentLoad,
}

/// Filters for listing servers available to clients.
#[derive(Debug, Clone, Default)]
pub struct ServerQuery {
    pub country_id: Option<u64>,
    pub city_id: Option<u64>,
    pub protocol: Option<ServerProtocol>,
    pub sort: ServerSort,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl ServerRecord {
    /// Active and not banned.
    pub fn is_available(&self) -> bool {
        self.is_active && !self.is_banned
    }

    pub fn matches_protocol(&self, protocol: Option<ServerProtocol>) -> bool {
        protocol.is_none_or(|p| self.protocol == p)
    }
}

/// Repository for server records.
pub struct ServerRepository<'a> {
    db: &'a Database,
}

impl<'a> ServerRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Look up a server by address.
    pub fn find(&self, address: &str) -> StoreResult<Option<ServerRecord>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(SERVERS)?;
        match table.get(address)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite a server, marking it active under `revision`.
    ///
    /// Existing records keep their id, ban flag and creation time.
    pub fn upsert(&self, draft: &ServerDraft, revision: i64) -> StoreResult<UpsertOutcome> {
        let now = Utc::now();
        let write_txn = self.db.inner().begin_write()?;
        let outcome = {
            let existing: Option<ServerRecord> = {
                let table = write_txn.open_table(SERVERS)?;
                let bytes = table.get(draft.address.as_str())?.map(|v| v.value().to_vec());
                bytes.as_deref().map(decode).transpose()?
            };

            let (record, outcome) = match existing {
                Some(mut server) => {
                    server.name = draft.name.clone();
                    server.country_id = draft.country_id;
                    server.city_id = draft.city_id;
                    server.protocol = draft.protocol;
                    server.current_load = draft.current_load;
                    server.configuration = draft.configuration.clone();
                    server.is_active = true;
                    server.revision = revision;
                    server.updated_at = now;
                    (server, UpsertOutcome::Updated)
                }
                None => {
                    let id = next_id(&write_txn, SERVER_SEQUENCE)?;
                    let server = ServerRecord {
                        id,
                        address: draft.address.clone(),
                        country_id: draft.country_id,
                        city_id: draft.city_id,
                        name: draft.name.clone(),
                        protocol: draft.protocol,
                        current_load: draft.current_load,
                        configuration: draft.configuration.clone(),
                        is_active: true,
                        is_banned: false,
                        revision,
                        created_at: now,
                        updated_at: now,
                    };
                    (server, UpsertOutcome::Created)
                }
            };

            let json = encode(&record)?;
            let mut table = write_txn.open_table(SERVERS)?;
            table.insert(record.address.as_str(), json.as_slice())?;
            outcome
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Deactivate every active server whose revision differs from `revision`.
    ///
    /// Returns the number of servers that were switched off.
    pub fn deactivate_stale(&self, revision: i64) -> StoreResult<usize> {
        let now = Utc::now();
        let write_txn = self.db.inner().begin_write()?;
        let count = {
            let mut table = write_txn.open_table(SERVERS)?;

            let mut stale = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                let server: ServerRecord = decode(value.value())?;
                if server.revision != revision && server.is_active {
                    stale.push(server);
                }
            }

            for mut server in stale.iter().cloned() {
                server.is_active = false;
                server.updated_at = now;
                let json = encode(&server)?;
                table.insert(server.address.as_str(), json.as_slice())?;
            }
            stale.len()
        };
        write_txn.commit()?;
        Ok(count)
    }

    /// Allocate the revision stamp for a new sync pass.
    ///
    /// The stamp is `now_millis` unless that would not be strictly greater
    /// than the previously allocated stamp.
    pub fn allocate_revision(&self, now_millis: i64) -> StoreResult<i64> {
        let write_txn = self.db.inner().begin_write()?;
        let revision = {
            let mut table = write_txn.open_table(META)?;
            let last = table.get(REVISION_KEY)?.map(|v| v.value() as i64);
            let revision = match last {
                Some(last) if now_millis <= last => last + 1,
                _ => now_millis,
            };
            table.insert(REVISION_KEY, revision as u64)?;
            revision
        };
        write_txn.commit()?;
        Ok(revision)
    }

    /// All server records, in address order.
    pub fn list_all(&self) -> StoreResult<Vec<ServerRecord>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(SERVERS)?;
        let mut servers = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            servers.push(decode(value.value())?);
        }
        Ok(servers)
    }

    /// Available servers matching the query.
    pub fn list_available(&self, query: &ServerQuery) -> StoreResult<Vec<ServerRecord>> {
        let mut servers: Vec<ServerRecord> = self
            .list_all()?
            .into_iter()
            .filter(|s| s.is_available())
            .filter(|s| query.country_id.is_none_or(|id| s.country_id == id))
            .filter(|s| query.city_id.is_none_or(|id| s.city_id == id))
            .filter(|s| s.matches_protocol(query.protocol))
            .collect();

        match query.sort {
            ServerSort::Id => servers.sort_by_key(|s| s.id),
            ServerSort::CurrentLoad => {
                servers.sort_by(|a, b| b.current_load.total_cmp(&a.current_load))
            }
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(servers.into_iter().skip(query.offset).take(limit).collect())
    }

    /// Servers with any of the given addresses, regardless of status.
    pub fn list_by_addresses(&self, addresses: &[String]) -> StoreResult<Vec<ServerRecord>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(SERVERS)?;
        let mut servers = Vec::new();
        for address in addresses {
            if let Some(value) = table.get(address.as_str())? {
                servers.push(decode(value.value())?);
            }
        }
        Ok(servers)
    }
}
