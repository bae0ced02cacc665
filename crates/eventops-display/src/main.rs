//! Headless display client for the EventOps dashboard.
//!
//! A display polls the API server for the current timer and renders the
//! countdown against the server's clock, not its own. A background task
//! keeps a clock offset estimated from `GET /time` round trips.
//!
//! # Architecture
//!
//! ```text
//! GET /time  --> clock sync --> offset ----+
//!                  ^                       v
//!                  +-- resync on resume -- renderer --> frame (log)
//!                                          ^
//! GET /timer --> poller --> snapshot ------+
//! ```
//!
//! Every task is cancelable; `Ctrl-C` stops all of them before exit.

mod client;
mod display;
mod error;
mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use eventops_core::clock::SystemClock;
use eventops_core::clock_sync::{ClockSync, SyncSettings, spawn_clock_sync};
use eventops_core::config::{EventOpsConfig, LoggingConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::client::ApiClient;
use crate::display::{LoopSettings, spawn_display};

/// Default configuration file, relative to the working directory.
const CONFIG_PATH: &str = "eventops-config.yaml";

/// Application entry point.
///
/// Loads configuration, starts the clock sync and display tasks, and runs
/// until `Ctrl-C`.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the HTTP client cannot
/// be built.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var("EVENTOPS_CONFIG")
        .map_or_else(|_| PathBuf::from(CONFIG_PATH), PathBuf::from);
    let config = if path.exists() {
        EventOpsConfig::from_file(&path)
            .with_context(|| format!("failed to load {}", path.display()))?
    } else {
        EventOpsConfig::parse("")?
    };

    init_tracing(&config.logging);
    let display_config = &config.display;
    info!(
        server_url = display_config.server_url,
        poll_interval_ms = display_config.poll_interval_ms,
        sync_interval_ms = display_config.sync_interval_ms,
        stale_after_ms = display_config.stale_after_ms,
        "eventops-display starting"
    );

    let client = ApiClient::new(
        &display_config.server_url,
        Duration::from_millis(display_config.request_timeout_ms),
    )?;
    match client.server_time().await {
        Ok(time) => info!(
            server = client.base_url(),
            timezone = time.timezone,
            "Server reachable"
        ),
        Err(e) => warn!(server = client.base_url(), error = %e, "Server not reachable yet"),
    }

    let sync = Arc::new(ClockSync::new(
        Arc::new(SystemClock),
        SyncSettings::from_config(display_config),
    ));
    let sync_task = spawn_clock_sync(Arc::clone(&sync), client.clone());

    let display = spawn_display(
        client,
        sync,
        sync_task.trigger(),
        LoopSettings {
            poll_interval: Duration::from_millis(display_config.poll_interval_ms),
            render_interval: Duration::from_millis(display_config.render_interval_ms),
        },
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutdown signal received");

    let last = display.snapshot();
    info!(
        timer = last.timer.as_ref().map(|t| t.title.as_str()),
        "Stopping display"
    );
    display.stop().await;
    sync_task.stop().await;
    info!("eventops-display stopped");
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
