// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, sync::Arc};

use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dvpn_server::{
    api::router,
    config::{Config, ConfigError},
    jobs::{JobRunner, NodeReconciler, PurchaseRedemptionReconciler, WalletEnrollmentReconciler},
    planwizard::{PlanWizardClient, PlanWizardError},
    sentinel::{SentinelClient, SentinelError},
    state::AppState,
    storage::{
        load_country_seeds, load_network_seeds, Database, GeoRepository, NetworkRepository,
        StoreError,
    },
    telemetry::init_tracing,
};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("country table is empty after seeding from {0}")]
    NoCountries(String),

    #[error("plan wizard client: {0}")]
    PlanWizard(#[from] PlanWizardError),

    #[error("sentinel client: {0}")]
    Sentinel(#[from] SentinelError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "dVPN server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    info!(environment = ?config.environment, "Starting dVPN server");

    let db_path = config.database_path();
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database opened");
    seed_countries(&db, &config)?;
    seed_networks(&db, &config)?;

    let shutdown = CancellationToken::new();
    let jobs = if config.environment.jobs_enabled() {
        spawn_jobs(&config, db.clone(), &shutdown)?
    } else {
        warn!("Debug environment, background jobs are disabled");
        Vec::new()
    };

    let app = router(AppState::new(db, config.api_settings()));
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "dVPN server listening (docs at /docs)");

    let signal = shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    for job in jobs {
        if let Err(e) = job.await {
            warn!(error = %e, "Job runner task ended abnormally");
        }
    }
    info!("dVPN server stopped");
    Ok(())
}

/// Load the country table from the seed file when it is empty.
fn seed_countries(db: &Database, config: &Config) -> Result<(), StartupError> {
    let geo = GeoRepository::new(db);
    if geo.country_count()? > 0 {
        return Ok(());
    }

    let path = &config.countries_seed_path;
    let seeds = load_country_seeds(path)?;
    let added = geo.seed_countries(&seeds)?;
    info!(added, path = %path.display(), "Seeded countries");

    if geo.country_count()? == 0 {
        return Err(StartupError::NoCountries(path.display().to_string()));
    }
    Ok(())
}

/// Load IP ranges for client geolocation when the table is empty.
///
/// A missing seed file only disables `GET /ip` lookups.
fn seed_networks(db: &Database, config: &Config) -> Result<(), StartupError> {
    let networks = NetworkRepository::new(db);
    if networks.network_count()? > 0 {
        return Ok(());
    }

    let path = &config.networks_seed_path;
    if !path.exists() {
        warn!(path = %path.display(), "No network seed file, IP lookups will find nothing");
        return Ok(());
    }
    let seeds = load_network_seeds(path)?;
    let added = networks.seed_networks(&seeds)?;
    info!(added, path = %path.display(), "Seeded IP networks");
    Ok(())
}

fn spawn_jobs(
    config: &Config,
    db: Arc<Database>,
    shutdown: &CancellationToken,
) -> Result<Vec<JoinHandle<()>>, StartupError> {
    let directory = Arc::new(PlanWizardClient::new(&config.planwizard, config.http_timeout)?);
    let ledger = Arc::new(SentinelClient::new(
        config.sentinel.clone(),
        config.http_timeout,
    )?);
    let schedule = config.schedule;

    let runners = [
        JobRunner::new(
            Arc::new(NodeReconciler::new(
                db.clone(),
                directory,
                config.sentinel.default_denom.clone(),
            )),
            schedule.node_sync,
        ),
        JobRunner::new(
            Arc::new(WalletEnrollmentReconciler::new(
                db.clone(),
                ledger.clone(),
                config.sentinel.fee_granter_address.clone(),
            )),
            schedule.wallet_enrollment,
        ),
        JobRunner::new(
            Arc::new(PurchaseRedemptionReconciler::new(db, ledger)),
            schedule.purchase_redemption,
        ),
    ];

    Ok(runners
        .into_iter()
        .map(|runner| tokio::spawn(runner.run(shutdown.clone())))
        .collect())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
