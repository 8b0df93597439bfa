// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup and passed
//! explicitly into the store, the external clients and the reconcilers.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ENVIRONMENT` | `production`, `development` or `debug` | `development` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding the redb database | `./data` |
//! | `COUNTRIES_SEED_PATH` | JSON list used to seed an empty country table | `./data/countries.json` |
//! | `NETWORKS_SEED_PATH` | JSON list of CIDR ranges with coordinates for `GET /ip` (optional file) | `./data/networks.json` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` (`json` in production) |
//! | `RUST_LOG` | Log level filter | `info,dvpn_server=debug,tower_http=info` |
//! | `PLANWIZARD_API_ENDPOINT` | Plan Wizard base URL | Required |
//! | `PLANWIZARD_PLAN_ID` | Plan whose nodes are synced | Required |
//! | `SENTINEL_API_ENDPOINT` | Sentinel REST gateway base URL | Required |
//! | `SENTINEL_RPC_ENDPOINT` | Chain RPC address forwarded to the gateway | Required |
//! | `SENTINEL_CHAIN_ID` | Chain identifier | Required |
//! | `SENTINEL_FEE_GRANTER_WALLET_ADDRESS` | Granter identity | Required |
//! | `SENTINEL_FEE_GRANTER_MNEMONIC` | Granter signing mnemonic | Required |
//! | `SENTINEL_DEFAULT_DENOM` | Native denomination | `udvpn` |
//! | `SENTINEL_GAS_PRICE` | Gas price (without denomination) | `0.1` |
//! | `SENTINEL_GAS_BASE` | Gas per wallet in a batch | `100000` |
//! | `REVENUECAT_AUTH` | Expected webhook `Authorization` header | Required |
//! | `LAST_IOS_VERSION` | Latest iOS client version | empty |
//! | `LAST_ANDROID_VERSION` | Latest Android client version | empty |
//! | `NODE_SYNC_INTERVAL_SECS` | Node directory sync interval | `1800` |
//! | `WALLET_ENROLLMENT_INTERVAL_SECS` | Fee-grant enrollment interval | `1` |
//! | `PURCHASE_REDEMPTION_INTERVAL_SECS` | Purchase redemption interval | `60` |
//! | `HTTP_TIMEOUT_SECS` | Timeout for calls to external APIs | `30` |

use std::{
    env,
    fmt,
    net::SocketAddr,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use url::Url;

pub const ENVIRONMENT_ENV: &str = "ENVIRONMENT";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const COUNTRIES_SEED_PATH_ENV: &str = "COUNTRIES_SEED_PATH";
pub const NETWORKS_SEED_PATH_ENV: &str = "NETWORKS_SEED_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Name of the redb file inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "dvpn.redb";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_COUNTRIES_SEED_PATH: &str = "./data/countries.json";
const DEFAULT_NETWORKS_SEED_PATH: &str = "./data/networks.json";
const DEFAULT_DENOM: &str = "udvpn";
const DEFAULT_GAS_PRICE: &str = "0.1";
const DEFAULT_GAS_BASE: u64 = 100_000;
const DEFAULT_NODE_SYNC_INTERVAL_SECS: u64 = 30 * 60;
const DEFAULT_WALLET_ENROLLMENT_INTERVAL_SECS: u64 = 1;
const DEFAULT_PURCHASE_REDEMPTION_INTERVAL_SECS: u64 = 60;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Production,
    #[default]
    Development,
    /// Serves the API without running any background jobs.
    Debug,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    pub fn jobs_enabled(self) -> bool {
        self != Self::Debug
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "" | "development" => Ok(Self::Development),
            "debug" => Ok(Self::Debug),
            other => Err(format!("unknown environment `{other}`")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

/// Plan Wizard node directory settings.
#[derive(Debug, Clone)]
pub struct PlanWizardConfig {
    pub api_endpoint: Url,
    pub plan_id: i64,
}

/// Sentinel ledger gateway settings.
#[derive(Clone)]
pub struct SentinelConfig {
    pub api_endpoint: Url,
    pub rpc_endpoint: String,
    pub chain_id: String,
    pub fee_granter_address: String,
    pub fee_granter_mnemonic: String,
    pub default_denom: String,
    pub gas_price: String,
    pub gas_base: u64,
}

impl fmt::Debug for SentinelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentinelConfig")
            .field("api_endpoint", &self.api_endpoint.as_str())
            .field("rpc_endpoint", &self.rpc_endpoint)
            .field("chain_id", &self.chain_id)
            .field("fee_granter_address", &self.fee_granter_address)
            .field("fee_granter_mnemonic", &"<redacted>")
            .field("default_denom", &self.default_denom)
            .field("gas_price", &self.gas_price)
            .field("gas_base", &self.gas_base)
            .finish()
    }
}

/// Intervals for the background reconcilers.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    pub node_sync: Duration,
    pub wallet_enrollment: Duration,
    pub purchase_redemption: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            node_sync: Duration::from_secs(DEFAULT_NODE_SYNC_INTERVAL_SECS),
            wallet_enrollment: Duration::from_secs(DEFAULT_WALLET_ENROLLMENT_INTERVAL_SECS),
            purchase_redemption: Duration::from_secs(DEFAULT_PURCHASE_REDEMPTION_INTERVAL_SECS),
        }
    }
}

/// Settings consumed by the request-serving layer.
#[derive(Debug, Clone, Default)]
pub struct ApiSettings {
    pub environment: Environment,
    pub fee_granter_address: String,
    pub default_denom: String,
    pub revenuecat_auth: String,
    pub last_ios_version: String,
    pub last_android_version: String,
}

/// Complete process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub countries_seed_path: PathBuf,
    pub networks_seed_path: PathBuf,
    pub log_format: LogFormat,
    pub http_timeout: Duration,
    pub planwizard: PlanWizardConfig,
    pub sentinel: SentinelConfig,
    pub schedule: ScheduleConfig,
    pub revenuecat_auth: String,
    pub last_ios_version: String,
    pub last_android_version: String,
}

impl Config {
    /// Load the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment: Environment = env_parse(ENVIRONMENT_ENV, Environment::Development)?;

        let host = env_or_default(HOST_ENV, DEFAULT_HOST);
        let port: u16 = env_parse(PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let default_log_format = if environment.is_production() {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        };

        let planwizard = PlanWizardConfig {
            api_endpoint: env_url("PLANWIZARD_API_ENDPOINT")?,
            plan_id: env_required_parse("PLANWIZARD_PLAN_ID")?,
        };

        let sentinel = SentinelConfig {
            api_endpoint: env_url("SENTINEL_API_ENDPOINT")?,
            rpc_endpoint: env_required("SENTINEL_RPC_ENDPOINT")?,
            chain_id: env_required("SENTINEL_CHAIN_ID")?,
            fee_granter_address: env_required("SENTINEL_FEE_GRANTER_WALLET_ADDRESS")?,
            fee_granter_mnemonic: env_required("SENTINEL_FEE_GRANTER_MNEMONIC")?,
            default_denom: env_or_default("SENTINEL_DEFAULT_DENOM", DEFAULT_DENOM),
            gas_price: env_or_default("SENTINEL_GAS_PRICE", DEFAULT_GAS_PRICE),
            gas_base: env_parse("SENTINEL_GAS_BASE", DEFAULT_GAS_BASE)?,
        };

        let schedule = ScheduleConfig {
            node_sync: env_secs("NODE_SYNC_INTERVAL_SECS", DEFAULT_NODE_SYNC_INTERVAL_SECS)?,
            wallet_enrollment: env_secs(
                "WALLET_ENROLLMENT_INTERVAL_SECS",
                DEFAULT_WALLET_ENROLLMENT_INTERVAL_SECS,
            )?,
            purchase_redemption: env_secs(
                "PURCHASE_REDEMPTION_INTERVAL_SECS",
                DEFAULT_PURCHASE_REDEMPTION_INTERVAL_SECS,
            )?,
        };

        Ok(Self {
            environment,
            bind_addr,
            data_dir: PathBuf::from(env_or_default(DATA_DIR_ENV, DEFAULT_DATA_DIR)),
            countries_seed_path: PathBuf::from(env_or_default(
                COUNTRIES_SEED_PATH_ENV,
                DEFAULT_COUNTRIES_SEED_PATH,
            )),
            networks_seed_path: PathBuf::from(env_or_default(
                NETWORKS_SEED_PATH_ENV,
                DEFAULT_NETWORKS_SEED_PATH,
            )),
            log_format: env_parse(LOG_FORMAT_ENV, default_log_format)?,
            http_timeout: env_secs("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            planwizard,
            sentinel,
            schedule,
            revenuecat_auth: env_required("REVENUECAT_AUTH")?,
            last_ios_version: env_or_default("LAST_IOS_VERSION", ""),
            last_android_version: env_or_default("LAST_ANDROID_VERSION", ""),
        })
    }

    /// Full path of the redb database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// The subset of settings handed to HTTP handlers.
    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            environment: self.environment,
            fee_granter_address: self.sentinel.fee_granter_address.clone(),
            default_denom: self.sentinel.default_denom.clone(),
            revenuecat_auth: self.revenuecat_auth.clone(),
            last_ios_version: self.last_ios_version.clone(),
            last_android_version: self.last_android_version.clone(),
        }
    }
}

fn env_present(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    env_present(name).ok_or(ConfigError::Missing(name))
}

fn env_or_default(name: &str, default: &str) -> String {
    env_present(name).unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env_present(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn env_required_parse<T>(name: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    parse_value(name, &env_required(name)?)
}

fn env_secs(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let secs: u64 = env_parse(name, default)?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "interval must be at least one second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn env_url(name: &'static str) -> Result<Url, ConfigError> {
    parse_url(name, &env_required(name)?)
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    Ok(url)
}
