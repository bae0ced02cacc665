//! Event status label and visitor counter.
//!
//! The status is a singleton. Visitors are counted per event day, where the
//! day is today's date in the configured timezone; get, set, increment, and
//! reset all act on today's row and older rows remain as history. The only
//! read-modify-write here is
//! [`StatusService::increment_visitors`], and it is delegated to the store
//! as a single atomic operation so concurrent counters at several doors do
//! not lose updates.

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use eventops_types::{DisplayEvent, EventStatus, VisitorCounter};
use tracing::info;

use crate::clock::Clock;
use crate::error::EngineError;
use crate::events::EventBus;
use crate::store::StatusStore;

/// Coordinator for the status singletons.
#[derive(Clone)]
pub struct StatusService<S> {
    store: S,
    clock: Arc<dyn Clock>,
    events: EventBus,
    default_label: String,
    tz: Tz,
}

impl<S> std::fmt::Debug for StatusService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusService")
            .field("default_label", &self.default_label)
            .field("tz", &self.tz)
            .finish_non_exhaustive()
    }
}

impl<S: StatusStore> StatusService<S> {
    /// Create a service over `store`. `default_label` seeds the status row
    /// the first time it is read; `tz` decides where an event day ends.
    pub fn new(
        store: S,
        clock: Arc<dyn Clock>,
        events: EventBus,
        default_label: String,
        tz: Tz,
    ) -> Self {
        Self {
            store,
            clock,
            events,
            default_label,
            tz,
        }
    }

    /// Today's event date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.tz).date_naive()
    }

    /// The current status, creating the default row if absent.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the store call fails.
    pub async fn get_status(&self) -> Result<EventStatus, EngineError> {
        Ok(self
            .store
            .get_status(&self.default_label, self.clock.now())
            .await?)
    }

    /// Replace the status label.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if `label` is blank.
    pub async fn set_status(&self, label: &str) -> Result<EventStatus, EngineError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(EngineError::InvalidInput("status must not be empty".to_owned()));
        }
        let status = self.store.set_status(label, self.clock.now()).await?;
        info!(status = %status.label, "Event status updated");
        self.events.publish(DisplayEvent::StatusChanged {
            status: status.clone(),
        });
        Ok(status)
    }

    /// Today's visitor counter, created at zero if absent.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the store call fails.
    pub async fn get_visitors(&self) -> Result<VisitorCounter, EngineError> {
        Ok(self.store.get_visitors(self.today(), self.clock.now()).await?)
    }

    /// Per-day counters for `from..=to`, newest day first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if `from` is after `to`.
    pub async fn visitor_history(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<VisitorCounter>, EngineError> {
        if from > to {
            return Err(EngineError::InvalidInput(format!(
                "history range starts after it ends: {from} > {to}"
            )));
        }
        Ok(self.store.visitor_history(from, to).await?)
    }

    /// Set today's counter to an absolute value.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if `count` is negative.
    pub async fn set_visitors(&self, count: i64) -> Result<VisitorCounter, EngineError> {
        if count < 0 {
            return Err(EngineError::InvalidInput(format!(
                "visitor count must not be negative, got {count}"
            )));
        }
        let counter = self
            .store
            .set_visitors(self.today(), count, self.clock.now())
            .await?;
        info!(count = counter.count, "Visitor count set");
        self.announce(counter);
        Ok(counter)
    }

    /// Add `delta` (which may be negative) to today's counter atomically in
    /// the store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the store call fails.
    pub async fn increment_visitors(&self, delta: i64) -> Result<VisitorCounter, EngineError> {
        let counter = self
            .store
            .increment_visitors(self.today(), delta, self.clock.now())
            .await?;
        info!(delta, count = counter.count, "Visitor count incremented");
        self.announce(counter);
        Ok(counter)
    }

    /// Set today's counter back to zero.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the store call fails.
    pub async fn reset_visitors(&self) -> Result<VisitorCounter, EngineError> {
        let counter = self
            .store
            .set_visitors(self.today(), 0, self.clock.now())
            .await?;
        info!("Visitor count reset");
        self.announce(counter);
        Ok(counter)
    }

    /// Round-trip the status store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the store is unreachable.
    pub async fn ping(&self) -> Result<(), EngineError> {
        Ok(self.store.ping_status().await?)
    }

    fn announce(&self, counter: VisitorCounter) {
        self.events.publish(DisplayEvent::VisitorsChanged {
            count: counter.count,
        });
    }
}
