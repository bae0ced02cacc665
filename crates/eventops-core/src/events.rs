//! In-process change-event bus.
//!
//! Every mutating operation publishes a [`DisplayEvent`] after its store
//! write succeeds. Subscribers that fall behind lose the oldest events;
//! displays recover by polling.

use eventops_types::DisplayEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Default capacity of the broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Fan-out channel of [`DisplayEvent`]s.
///
/// Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DisplayEvent>,
}

impl EventBus {
    /// Create a bus holding up to `capacity` undelivered events per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Returns the number of subscribers reached; zero
    /// when nobody is listening.
    pub fn publish(&self, event: DisplayEvent) -> usize {
        let name = event.name();
        let reached = self.tx.send(event).unwrap_or(0);
        debug!(event = name, subscribers = reached, "Published display event");
        reached
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
