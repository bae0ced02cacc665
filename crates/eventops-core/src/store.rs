//! Shared state store interfaces.
//!
//! The store is the single source of truth for timers, messages, actions,
//! the status singleton, and the visitor counters. Engines never cache rows
//! between calls; every operation reads the store, derives, and writes back. Writes are
//! last-write-wins per row except [`StatusStore::increment_visitors`], which
//! must be an atomic read-modify-write inside the store.
//!
//! Implementations live in this crate ([`MemoryStore`]) and in
//! `eventops-db` (`PostgreSQL`, `Dragonfly`).
//!
//! [`MemoryStore`]: crate::memory::MemoryStore

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use eventops_types::{
    ActionId, EventStatus, MessageId, Timer, TimerAction, TimerId, TimerMessage, VisitorCounter,
};

use crate::error::StoreError;

/// Persistence for timers and the current-timer pointer.
pub trait TimerStore: Clone + Send + Sync + 'static {
    /// Insert a new timer row.
    fn insert_timer(&self, timer: &Timer) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch one timer. `is_current` reflects the pointer row.
    fn get_timer(
        &self,
        id: TimerId,
    ) -> impl Future<Output = Result<Option<Timer>, StoreError>> + Send;

    /// All timers, newest first.
    fn list_timers(&self) -> impl Future<Output = Result<Vec<Timer>, StoreError>> + Send;

    /// Overwrite a timer row. Returns `false` if the row no longer exists.
    fn update_timer(&self, timer: &Timer)
    -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Hard-delete a timer and its actions. Clears the current pointer if it
    /// referenced the timer, and detaches messages that referenced it.
    /// Returns `false` if nothing was deleted.
    fn delete_timer(&self, id: TimerId) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// The timer the current pointer references, if any.
    fn current_timer_id(
        &self,
    ) -> impl Future<Output = Result<Option<TimerId>, StoreError>> + Send;

    /// Move the single current pointer (or clear it with `None`).
    fn set_current_timer(
        &self,
        id: Option<TimerId>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Cheap round trip used by health checks.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Persistence for broadcast messages.
pub trait MessageStore: Clone + Send + Sync + 'static {
    /// Insert a new message row.
    fn insert_message(
        &self,
        message: &TimerMessage,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch one message regardless of expiry.
    fn get_message(
        &self,
        id: MessageId,
    ) -> impl Future<Output = Result<Option<TimerMessage>, StoreError>> + Send;

    /// Messages not expired at `now`, newest first with id as tiebreak.
    fn list_messages(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<TimerMessage>, StoreError>> + Send;

    /// Delete a message. Returns `false` if nothing was deleted.
    fn delete_message(
        &self,
        id: MessageId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Drop messages whose expiry is at or before `before`. Returns rows
    /// removed.
    fn purge_expired_messages(
        &self,
        before: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// Persistence for timer actions.
pub trait ActionStore: Clone + Send + Sync + 'static {
    /// Insert a new action row.
    fn insert_action(
        &self,
        action: &TimerAction,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch one action.
    fn get_action(
        &self,
        id: ActionId,
    ) -> impl Future<Output = Result<Option<TimerAction>, StoreError>> + Send;

    /// Actions for one timer (or all), largest trigger first.
    fn list_actions(
        &self,
        timer_id: Option<TimerId>,
    ) -> impl Future<Output = Result<Vec<TimerAction>, StoreError>> + Send;

    /// Overwrite an action row. Returns `false` if it no longer exists.
    fn update_action(
        &self,
        action: &TimerAction,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Delete an action. Returns `false` if nothing was deleted.
    fn delete_action(&self, id: ActionId)
    -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Clear `executed` on every action of a timer. Returns rows touched.
    fn reset_actions(
        &self,
        timer_id: TimerId,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Set `executed` only if it is currently clear. Returns whether this
    /// call flipped it, so an action fires once across server instances.
    fn mark_action_executed(
        &self,
        id: ActionId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Persistence for the event status singleton and per-day visitor counters.
pub trait StatusStore: Clone + Send + Sync + 'static {
    /// The status row, created with `default_label` if absent.
    fn get_status(
        &self,
        default_label: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<EventStatus, StoreError>> + Send;

    /// Upsert the status label.
    fn set_status(
        &self,
        label: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<EventStatus, StoreError>> + Send;

    /// The counter for `date`, created at zero if absent.
    fn get_visitors(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<VisitorCounter, StoreError>> + Send;

    /// Upsert the counter for `date` to an absolute value.
    fn set_visitors(
        &self,
        date: NaiveDate,
        count: i64,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<VisitorCounter, StoreError>> + Send;

    /// Atomically add `delta` to the counter for `date` inside the store and
    /// return the new row.
    fn increment_visitors(
        &self,
        date: NaiveDate,
        delta: i64,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<VisitorCounter, StoreError>> + Send;

    /// Counters for every day in `from..=to`, newest day first. Days that
    /// never had a counter are absent.
    fn visitor_history(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<VisitorCounter>, StoreError>> + Send;

    /// Cheap round trip used by health checks.
    fn ping_status(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
