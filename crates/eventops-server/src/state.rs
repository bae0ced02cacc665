//! Shared application state for the API server.
//!
//! [`AppState`] bundles the timer engine, message board, timer actions,
//! and status service over the configured store backends, plus the event
//! bus the `WebSocket` endpoint streams from. Nothing in it caches store
//! data; the store remains the single source of truth.

use std::sync::Arc;

use eventops_core::actions::TimerActions;
use eventops_core::clock::{Clock, SystemClock};
use eventops_core::config::{AuthConfig, EventOpsConfig};
use eventops_core::events::EventBus;
use eventops_core::messages::MessageBoard;
use eventops_core::status::StatusService;
use eventops_core::timer::TimerEngine;
use eventops_db::{Backends, StatusBackend, StoreBackend};
use eventops_types::DisplayEvent;
use tokio::sync::broadcast;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Timer run-state machine.
    pub timers: TimerEngine<StoreBackend>,
    /// Broadcast messages.
    pub board: MessageBoard<StoreBackend>,
    /// Timer actions.
    pub actions: TimerActions<StoreBackend>,
    /// Status label and visitor counter.
    pub status: StatusService<StatusBackend>,
    /// Change events for `WebSocket` subscribers.
    pub events: EventBus,
    /// Authoritative server clock.
    pub clock: Arc<dyn Clock>,
    /// IANA zone name reported by `GET /time`.
    pub timezone: String,
    /// Bearer token table.
    pub auth: AuthConfig,
}

impl AppState {
    /// Wire the services over `backends` using the system clock.
    pub fn new(backends: Backends, config: &EventOpsConfig) -> Self {
        Self::with_clock(backends, config, Arc::new(SystemClock))
    }

    /// Wire the services over `backends` using `clock`.
    pub fn with_clock(backends: Backends, config: &EventOpsConfig, clock: Arc<dyn Clock>) -> Self {
        let events = EventBus::default();
        let Backends { store, status } = backends;
        Self {
            timers: TimerEngine::new(
                store.clone(),
                Arc::clone(&clock),
                config.timer.clone(),
                events.clone(),
            ),
            board: MessageBoard::new(store.clone(), Arc::clone(&clock), events.clone()),
            actions: TimerActions::new(store, Arc::clone(&clock), events.clone()),
            status: StatusService::new(
                status,
                Arc::clone(&clock),
                events.clone(),
                config.status.default_label.clone(),
                config.server.tz(),
            ),
            events,
            clock,
            timezone: config.server.timezone.clone(),
            auth: config.auth.clone(),
        }
    }

    /// In-memory state with default configuration.
    pub fn in_memory() -> Self {
        Self::new(Backends::memory(), &EventOpsConfig::default())
    }

    /// Subscribe to the change-event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.events.subscribe()
    }

    /// Current server time in Unix milliseconds.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}
