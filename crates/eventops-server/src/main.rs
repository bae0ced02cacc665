//! API server binary for the EventOps dashboard.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `eventops-config.yaml` (or `EVENTOPS_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect the store backends and run migrations
//! 4. Start the action scheduler
//! 5. Serve HTTP until `Ctrl-C`
//! 6. Stop the scheduler

use std::path::PathBuf;
use std::sync::Arc;

use eventops_core::config::LoggingConfig;
use eventops_server::startup::{StartupError, bootstrap, load_config};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Default configuration file, relative to the working directory.
const CONFIG_PATH: &str = "eventops-config.yaml";

/// Application entry point for the API server.
///
/// # Errors
///
/// Returns an error if configuration, store connection, or the server fails.
#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let path = std::env::var("EVENTOPS_CONFIG")
        .map_or_else(|_| PathBuf::from(CONFIG_PATH), PathBuf::from);
    let config = load_config(&path)?;

    init_tracing(&config.logging);
    info!(
        host = config.server.host,
        port = config.server.port,
        store = ?config.store.backend,
        status_store = ?config.store.status_backend,
        "eventops-server starting"
    );

    let runtime = bootstrap(&config).await?;
    let served = eventops_server::start_server(
        &config.server,
        Arc::clone(&runtime.state),
        shutdown_signal(),
    )
    .await;

    runtime.shutdown().await;
    info!("eventops-server shutdown complete");
    served?;
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolves on `Ctrl-C`.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
