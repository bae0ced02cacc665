//! Server startup: configuration loading, store connection, and the
//! background action scheduler.
//!
//! # Usage
//!
//! ```rust,ignore
//! use eventops_server::startup::{bootstrap, load_config};
//!
//! let config = load_config(Path::new("eventops-config.yaml"))?;
//! let runtime = bootstrap(&config).await?;
//! // serve runtime.state, then:
//! runtime.shutdown().await;
//! ```

use std::path::Path;
use std::sync::Arc;

use eventops_core::config::{ConfigError, EventOpsConfig};
use eventops_core::scheduler::spawn_action_scheduler;
use eventops_db::{Backends, DbError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::server::ServerError;
use crate::state::AppState;

/// Errors that can occur while starting the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The configuration file could not be read or parsed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// A store backend could not be connected or migrated.
    #[error("store error: {source}")]
    Store {
        /// The underlying database error.
        #[from]
        source: DbError,
    },

    /// The server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },
}

/// Load configuration from `path`, falling back to defaults (plus
/// environment overrides) when the file does not exist.
pub fn load_config(path: &Path) -> Result<EventOpsConfig, StartupError> {
    if path.exists() {
        Ok(EventOpsConfig::from_file(path)?)
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        Ok(EventOpsConfig::parse("")?)
    }
}

/// A wired application plus its background tasks.
pub struct Runtime {
    /// Shared handler state.
    pub state: Arc<AppState>,
    scheduler: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl Runtime {
    /// Stop the action scheduler and wait for it to exit.
    pub async fn shutdown(self) {
        // The scheduler also exits when the sender is dropped.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.scheduler.await {
            warn!(error = %e, "Action scheduler task failed");
        }
    }
}

/// Connect the configured stores, build [`AppState`], and start the
/// action scheduler.
pub async fn bootstrap(config: &EventOpsConfig) -> Result<Runtime, StartupError> {
    let backends = Backends::connect(&config.store).await?;
    Ok(start_with(backends, config))
}

/// Build a [`Runtime`] over already-connected backends.
pub fn start_with(backends: Backends, config: &EventOpsConfig) -> Runtime {
    let state = Arc::new(AppState::new(backends, config));
    let (shutdown, rx) = watch::channel(false);
    let scheduler = spawn_action_scheduler(
        state.timers.clone(),
        state.actions.clone(),
        config.timer.action_check_interval(),
        rx,
    );
    if !config.auth.enabled() {
        warn!("No session tokens configured, mutating endpoints are open");
    }
    Runtime {
        state,
        scheduler,
        shutdown,
    }
}
