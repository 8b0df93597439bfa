// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Countries and cities referenced by servers.
//!
//! Countries are seeded at startup and looked up by exact name. Cities are
//! created on demand the first time a node reports an unseen
//! `(country, city)` pair.

use std::{collections::HashMap, path::Path};

use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::servers::{ServerProtocol, ServerRecord};
use crate::storage::database::{
    decode, encode, next_id, Database, StoreError, StoreResult, CITIES, CITY_KEYS, COUNTRIES,
    COUNTRY_NAMES, SERVERS,
};

const COUNTRY_SEQUENCE: &str = "countries";
const CITY_SEQUENCE: &str = "cities";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CountryRecord {
    pub id: u64,
    pub name: String,
    /// ISO 3166-1 alpha-2 code.
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CityRecord {
    pub id: u64,
    pub country_id: u64,
    pub name: String,
}

/// Entry of the country seed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountrySeed {
    pub name: String,
    pub code: String,
}

/// Read a JSON list of [`CountrySeed`] entries.
pub fn load_country_seeds(path: &Path) -> StoreResult<Vec<CountrySeed>> {
    let raw = std::fs::read(path)?;
    decode(&raw)
}

fn city_key(country_id: u64, name: &str) -> String {
    format!("{country_id}|{name}")
}

/// Repository for countries and cities.
pub struct GeoRepository<'a> {
    db: &'a Database,
}

impl<'a> GeoRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert every seed whose name is not already present.
    ///
    /// Returns the number of countries added.
    pub fn seed_countries(&self, seeds: &[CountrySeed]) -> StoreResult<usize> {
        let write_txn = self.db.inner().begin_write()?;
        let mut added = 0;
        for seed in seeds {
            let exists = {
                let names = write_txn.open_table(COUNTRY_NAMES)?;
                let found = names.get(seed.name.as_str())?.is_some();
                found
            };
            if exists {
                continue;
            }

            let id = next_id(&write_txn, COUNTRY_SEQUENCE)?;
            let record = CountryRecord {
                id,
                name: seed.name.clone(),
                code: seed.code.clone(),
            };
            let json = encode(&record)?;
            {
                let mut countries = write_txn.open_table(COUNTRIES)?;
                countries.insert(id, json.as_slice())?;
                let mut names = write_txn.open_table(COUNTRY_NAMES)?;
                names.insert(record.name.as_str(), id)?;
            }
            added += 1;
        }
        write_txn.commit()?;
        Ok(added)
    }

    pub fn country_count(&self) -> StoreResult<u64> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(COUNTRIES)?;
        Ok(table.len()?)
    }

    /// Look up a country by its exact name.
    pub fn find_country_by_name(&self, name: &str) -> StoreResult<Option<CountryRecord>> {
        let read_txn = self.db.inner().begin_read()?;
        let names = read_txn.open_table(COUNTRY_NAMES)?;
        let Some(id) = names.get(name)?.map(|v| v.value()) else {
            return Ok(None);
        };
        let countries = read_txn.open_table(COUNTRIES)?;
        match countries.get(id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_country(&self, id: u64) -> StoreResult<CountryRecord> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(COUNTRIES)?;
        match table.get(id)? {
            Some(value) => decode(value.value()),
            None => Err(StoreError::NotFound(format!("Country {id}"))),
        }
    }

    pub fn find_city(&self, country_id: u64, name: &str) -> StoreResult<Option<CityRecord>> {
        let read_txn = self.db.inner().begin_read()?;
        let keys = read_txn.open_table(CITY_KEYS)?;
        let Some(id) = keys.get(city_key(country_id, name).as_str())?.map(|v| v.value()) else {
            return Ok(None);
        };
        let cities = read_txn.open_table(CITIES)?;
        match cities.get(id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Return the city `(country_id, name)`, creating it if needed.
    ///
    /// The boolean is `true` when the city was created by this call.
    pub fn resolve_city(&self, country_id: u64, name: &str) -> StoreResult<(CityRecord, bool)> {
        if let Some(city) = self.find_city(country_id, name)? {
            return Ok((city, false));
        }

        let key = city_key(country_id, name);
        let write_txn = self.db.inner().begin_write()?;
        let resolved = {
            // Re-check inside the write transaction; another job may have won.
            let existing_id = {
                let keys = write_txn.open_table(CITY_KEYS)?;
                let id = keys.get(key.as_str())?.map(|v| v.value());
                id
            };

            match existing_id {
                Some(id) => {
                    let cities = write_txn.open_table(CITIES)?;
                    let bytes = cities
                        .get(id)?
                        .map(|v| v.value().to_vec())
                        .ok_or_else(|| StoreError::NotFound(format!("City {id}")))?;
                    (decode(&bytes)?, false)
                }
                None => {
                    let id = next_id(&write_txn, CITY_SEQUENCE)?;
                    let city = CityRecord {
                        id,
                        country_id,
                        name: name.to_string(),
                    };
                    let json = encode(&city)?;
                    let mut cities = write_txn.open_table(CITIES)?;
                    cities.insert(id, json.as_slice())?;
                    let mut keys = write_txn.open_table(CITY_KEYS)?;
                    keys.insert(key.as_str(), id)?;
                    (city, true)
                }
            }
        };
        write_txn.commit()?;
        Ok(resolved)
    }

    /// Countries with at least one available server, by name.
    pub fn countries_with_servers(
        &self,
        protocol: Option<ServerProtocol>,
    ) -> StoreResult<Vec<(CountryRecord, usize)>> {
        let read_txn = self.db.inner().begin_read()?;
        let counts = count_available(&read_txn, protocol, |s| Some(s.country_id))?;

        let countries = read_txn.open_table(COUNTRIES)?;
        let mut result = Vec::new();
        for (id, count) in counts {
            if let Some(value) = countries.get(id)? {
                result.push((decode::<CountryRecord>(value.value())?, count));
            }
        }
        result.sort_by(|(a, _), (b, _)| a.name.cmp(&b.name));
        Ok(result)
    }

    /// Cities of a country with at least one available server, busiest first.
    pub fn cities_with_servers(
        &self,
        country_id: u64,
        protocol: Option<ServerProtocol>,
    ) -> StoreResult<Vec<(CityRecord, usize)>> {
        let read_txn = self.db.inner().begin_read()?;
        let counts = count_available(&read_txn, protocol, |s| {
            (s.country_id == country_id).then_some(s.city_id)
        })?;

        let cities = read_txn.open_table(CITIES)?;
        let mut result = Vec::new();
        for (id, count) in counts {
            if let Some(value) = cities.get(id)? {
                result.push((decode::<CityRecord>(value.value())?, count));
            }
        }
        result.sort_by(|(a, a_count), (b, b_count)| {
            b_count.cmp(a_count).then_with(|| a.name.cmp(&b.name))
        });
        Ok(result)
    }
}

/// Count available servers grouped by the key `group` extracts.
fn count_available(
    read_txn: &redb::ReadTransaction,
    protocol: Option<ServerProtocol>,
    group: impl Fn(&ServerRecord) -> Option<u64>,
) -> StoreResult<HashMap<u64, usize>> {
    let servers = read_txn.open_table(SERVERS)?;
    let mut counts = HashMap::new();
    for entry in servers.iter()? {
        let (_, value) = entry?;
        let server: ServerRecord = decode(value.value())?;
        if !server.is_available() || !server.matches_protocol(protocol) {
            continue;
        }
        if let Some(key) = group(&server) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    Ok(counts)
}
