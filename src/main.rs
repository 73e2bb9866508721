//! Maintenance daemon: runs the expiration reaper against the configured
//! store. The HTTP surface lives in a separate service and consumes this
//! crate as a library.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use curt::config::{Config, DatabaseBackend};
use curt::reaper::ExpirationReaper;
use curt::storage::{PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    storage.init().await?;
    info!("Database initialized");

    let interval = Duration::from_secs(config.reaper.sweep_interval_secs);
    let reaper = ExpirationReaper::new(Arc::clone(&storage), interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(reaper.run(shutdown_rx));
    info!(
        interval_secs = config.reaper.sweep_interval_secs,
        "expiration reaper running"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    handle.await?;

    Ok(())
}
