// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! IP networks with the coordinates clients inside them are placed at.
//!
//! Ranges are keyed by their first address, so the containing range of an
//! address is found by walking backwards from that address. Nested ranges
//! resolve to the most specific one.

use std::{net::IpAddr, path::Path};

use ipnet::IpNet;
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};

use crate::storage::database::{decode, encode, Database, StoreResult, NETWORKS};

/// A CIDR range and its location. Also the entry format of the seed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub network: IpNet,
    pub latitude: f64,
    pub longitude: f64,
}

/// Read a JSON list of [`NetworkRecord`] entries.
pub fn load_network_seeds(path: &Path) -> StoreResult<Vec<NetworkRecord>> {
    let raw = std::fs::read(path)?;
    decode(&raw)
}

/// IPv4-mapped IPv6 addresses are treated as the IPv4 address they carry.
pub fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        IpAddr::V4(_) => ip,
    }
}

fn address_key(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u128::from(v4.to_ipv6_mapped()),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

fn network_key(network: &IpNet) -> (u128, u8) {
    (address_key(network.network()), network.prefix_len())
}

pub struct NetworkRepository<'a> {
    db: &'a Database,
}

impl<'a> NetworkRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert every seed whose range is not already present.
    ///
    /// Host bits are cleared before storing. Returns the number of ranges
    /// added.
    pub fn seed_networks(&self, seeds: &[NetworkRecord]) -> StoreResult<usize> {
        let write_txn = self.db.inner().begin_write()?;
        let mut added = 0;
        {
            let mut table = write_txn.open_table(NETWORKS)?;
            for seed in seeds {
                let record = NetworkRecord {
                    network: seed.network.trunc(),
                    ..seed.clone()
                };
                let key = network_key(&record.network);
                if table.get(key)?.is_some() {
                    continue;
                }
                let json = encode(&record)?;
                table.insert(key, json.as_slice())?;
                added += 1;
            }
        }
        write_txn.commit()?;
        Ok(added)
    }

    pub fn network_count(&self) -> StoreResult<u64> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(NETWORKS)?;
        Ok(table.len()?)
    }

    /// The most specific stored range containing `ip`.
    pub fn find_containing(&self, ip: IpAddr) -> StoreResult<Option<NetworkRecord>> {
        let ip = canonical_ip(ip);
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(NETWORKS)?;

        for entry in table.range(..=(address_key(ip), u8::MAX))?.rev() {
            let (_, value) = entry?;
            let record: NetworkRecord = decode(value.value())?;
            if record.network.contains(&ip) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}
