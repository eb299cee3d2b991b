//! Crowdwatch engine binary.
//!
//! This is the main entry point that wires together the persistence
//! layer, the change feed subscriber, the alert pipeline, and the
//! Observer API. It loads configuration, initializes all subsystems,
//! and runs until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `crowdwatch-config.yaml`
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Build the shared zone store and action log
//! 5. Start the Observer API server
//! 6. Connect to NATS and start the change feed subscriber
//! 7. Wait for `Ctrl-C`
//! 8. Stop the subscription and close the pool

mod db_fetcher;
mod error;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crowdwatch_core::{CrowdwatchConfig, EmergencyActionLog, ZoneStateStore};
use crowdwatch_db::PostgresPool;
use crowdwatch_feed::{ChangeFeedSubscriber, NatsFeedSource};
use crowdwatch_observer::state::AppState;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::db_fetcher::PostgresFetcher;
use crate::error::EngineError;

/// Application entry point for the Crowdwatch engine.
///
/// # Errors
///
/// Returns an error if any initialization step fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("crowdwatch-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        nats_url = config.infrastructure.nats_url,
        observer_port = config.infrastructure.observer_port,
        subject_prefix = config.feed.subject_prefix,
        "Configuration loaded"
    );

    // 3. Connect to PostgreSQL and run migrations.
    let pool = PostgresPool::connect_url(&config.infrastructure.postgres_url)
        .await
        .map_err(EngineError::from)?;
    pool.run_migrations().await.map_err(EngineError::from)?;

    // 4. Build the shared engine state.
    let store = Arc::new(RwLock::new(ZoneStateStore::new(
        config.ingestion.missing_capacity,
    )));
    let action_log = Arc::new(RwLock::new(EmergencyActionLog::new()));
    info!(
        missing_capacity = ?config.ingestion.missing_capacity,
        "Zone store initialized"
    );

    // 5. Start the Observer API server.
    let app_state = Arc::new(
        AppState::new(Arc::clone(&store), Arc::clone(&action_log)).with_db(pool.clone()),
    );
    let _observer_handle = crowdwatch_observer::spawn_observer(
        &config.infrastructure.observer_host,
        config.infrastructure.observer_port,
        Arc::clone(&app_state),
    )
    .await
    .map_err(EngineError::from)?;
    info!(
        port = config.infrastructure.observer_port,
        "Observer API server started"
    );

    // 6. Connect to NATS and start the change feed subscriber.
    let source = NatsFeedSource::connect(
        &config.infrastructure.nats_url,
        &config.feed.subject_prefix,
    )
    .await
    .map_err(EngineError::from)?;

    let subscriber = ChangeFeedSubscriber::new(
        Arc::new(source),
        Arc::new(PostgresFetcher::new(pool.clone())),
        store,
        action_log,
        Arc::new(app_state.alert_sink()),
        Duration::from_millis(config.feed.reconnect_delay_ms),
        config.ingestion.log_fetch_limit,
    );
    let subscription = subscriber.start();
    info!("Change feed subscriber started, engine running");

    // 7. Run until interrupted.
    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");

    // 8. Stop the subscription and close the pool.
    subscription.stop().await;
    pool.close().await;

    info!("crowdwatch-engine shutdown complete");
    Ok(())
}

/// Load the engine configuration from `crowdwatch-config.yaml`.
///
/// Looks for the config file relative to the current working directory;
/// environment overrides apply either way.
fn load_config() -> Result<CrowdwatchConfig, EngineError> {
    let config_path = Path::new("crowdwatch-config.yaml");
    if config_path.exists() {
        let config = CrowdwatchConfig::from_file(config_path)?;
        Ok(config)
    } else {
        info!("Config file not found, using defaults");
        let mut config = CrowdwatchConfig::default();
        config.infrastructure.apply_env_overrides();
        Ok(config)
    }
}
