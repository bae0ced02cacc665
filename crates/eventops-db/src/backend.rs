//! Store trait implementations and backend selection.
//!
//! [`PostgresPool`] implements every store trait; [`DragonflyPool`]
//! implements [`StatusStore`]. The engine is generic over its store, so the
//! server picks one concrete backend at startup through the
//! [`StoreBackend`] and [`StatusBackend`] enums rather than trait objects.

use chrono::{DateTime, NaiveDate, Utc};
use eventops_core::config::{StatusStoreKind, StoreConfig, StoreKind};
use eventops_core::error::StoreError;
use eventops_core::memory::MemoryStore;
use eventops_core::store::{ActionStore, MessageStore, StatusStore, TimerStore};
use eventops_types::{
    ActionId, EventStatus, MessageId, Timer, TimerAction, TimerId, TimerMessage, VisitorCounter,
};

use crate::action_store::ActionTable;
use crate::dragonfly::DragonflyPool;
use crate::error::DbError;
use crate::message_store::MessageTable;
use crate::postgres::{PostgresConfig, PostgresPool};
use crate::status_store::StatusTable;
use crate::timer_store::TimerTable;

// =============================================================================
// PostgreSQL
// =============================================================================

impl TimerStore for PostgresPool {
    async fn insert_timer(&self, timer: &Timer) -> Result<(), StoreError> {
        Ok(TimerTable::new(self.pool()).insert(timer).await?)
    }

    async fn get_timer(&self, id: TimerId) -> Result<Option<Timer>, StoreError> {
        Ok(TimerTable::new(self.pool()).get(id).await?)
    }

    async fn list_timers(&self) -> Result<Vec<Timer>, StoreError> {
        Ok(TimerTable::new(self.pool()).list().await?)
    }

    async fn update_timer(&self, timer: &Timer) -> Result<bool, StoreError> {
        Ok(TimerTable::new(self.pool()).update(timer).await?)
    }

    async fn delete_timer(&self, id: TimerId) -> Result<bool, StoreError> {
        Ok(TimerTable::new(self.pool()).delete(id).await?)
    }

    async fn current_timer_id(&self) -> Result<Option<TimerId>, StoreError> {
        Ok(TimerTable::new(self.pool()).current_id().await?)
    }

    async fn set_current_timer(&self, id: Option<TimerId>) -> Result<(), StoreError> {
        Ok(TimerTable::new(self.pool()).set_current(id).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(Self::ping(self).await?)
    }
}

impl MessageStore for PostgresPool {
    async fn insert_message(&self, message: &TimerMessage) -> Result<(), StoreError> {
        Ok(MessageTable::new(self.pool()).insert(message).await?)
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<TimerMessage>, StoreError> {
        Ok(MessageTable::new(self.pool()).get(id).await?)
    }

    async fn list_messages(&self, now: DateTime<Utc>) -> Result<Vec<TimerMessage>, StoreError> {
        Ok(MessageTable::new(self.pool()).list_live(now).await?)
    }

    async fn delete_message(&self, id: MessageId) -> Result<bool, StoreError> {
        Ok(MessageTable::new(self.pool()).delete(id).await?)
    }

    async fn purge_expired_messages(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(MessageTable::new(self.pool()).purge_expired(before).await?)
    }
}

impl ActionStore for PostgresPool {
    async fn insert_action(&self, action: &TimerAction) -> Result<(), StoreError> {
        Ok(ActionTable::new(self.pool()).insert(action).await?)
    }

    async fn get_action(&self, id: ActionId) -> Result<Option<TimerAction>, StoreError> {
        Ok(ActionTable::new(self.pool()).get(id).await?)
    }

    async fn list_actions(&self, timer_id: Option<TimerId>) -> Result<Vec<TimerAction>, StoreError> {
        Ok(ActionTable::new(self.pool()).list(timer_id).await?)
    }

    async fn update_action(&self, action: &TimerAction) -> Result<bool, StoreError> {
        Ok(ActionTable::new(self.pool()).update(action).await?)
    }

    async fn delete_action(&self, id: ActionId) -> Result<bool, StoreError> {
        Ok(ActionTable::new(self.pool()).delete(id).await?)
    }

    async fn reset_actions(&self, timer_id: TimerId) -> Result<u64, StoreError> {
        Ok(ActionTable::new(self.pool()).reset(timer_id).await?)
    }

    async fn mark_action_executed(&self, id: ActionId) -> Result<bool, StoreError> {
        Ok(ActionTable::new(self.pool()).mark_executed(id).await?)
    }
}

impl StatusStore for PostgresPool {
    async fn get_status(&self, default_label: &str, now: DateTime<Utc>) -> Result<EventStatus, StoreError> {
        Ok(StatusTable::new(self.pool())
            .get_or_init_status(default_label, now)
            .await?)
    }

    async fn set_status(&self, label: &str, now: DateTime<Utc>) -> Result<EventStatus, StoreError> {
        Ok(StatusTable::new(self.pool()).upsert_status(label, now).await?)
    }

    async fn get_visitors(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<VisitorCounter, StoreError> {
        Ok(StatusTable::new(self.pool())
            .get_or_init_visitors(date, now)
            .await?)
    }

    async fn set_visitors(&self, date: NaiveDate, count: i64, now: DateTime<Utc>) -> Result<VisitorCounter, StoreError> {
        Ok(StatusTable::new(self.pool())
            .upsert_visitors(date, count, now)
            .await?)
    }

    async fn increment_visitors(&self, date: NaiveDate, delta: i64, now: DateTime<Utc>) -> Result<VisitorCounter, StoreError> {
        Ok(StatusTable::new(self.pool())
            .increment_visitors(date, delta, now)
            .await?)
    }

    async fn visitor_history(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<VisitorCounter>, StoreError> {
        Ok(StatusTable::new(self.pool()).history(from, to).await?)
    }

    async fn ping_status(&self) -> Result<(), StoreError> {
        Ok(Self::ping(self).await?)
    }
}

// =============================================================================
// Dragonfly
// =============================================================================

impl StatusStore for DragonflyPool {
    async fn get_status(&self, default_label: &str, now: DateTime<Utc>) -> Result<EventStatus, StoreError> {
        Ok(self.get_or_init_status(default_label, now).await?)
    }

    async fn set_status(&self, label: &str, now: DateTime<Utc>) -> Result<EventStatus, StoreError> {
        Ok(Self::set_status(self, label, now).await?)
    }

    async fn get_visitors(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<VisitorCounter, StoreError> {
        Ok(Self::get_visitors(self, date, now).await?)
    }

    async fn set_visitors(&self, date: NaiveDate, count: i64, now: DateTime<Utc>) -> Result<VisitorCounter, StoreError> {
        Ok(Self::set_visitors(self, date, count, now).await?)
    }

    async fn increment_visitors(&self, date: NaiveDate, delta: i64, now: DateTime<Utc>) -> Result<VisitorCounter, StoreError> {
        Ok(Self::increment_visitors(self, date, delta, now).await?)
    }

    async fn visitor_history(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<VisitorCounter>, StoreError> {
        Ok(Self::visitor_history(self, from, to).await?)
    }

    async fn ping_status(&self) -> Result<(), StoreError> {
        Ok(self.ping().await?)
    }
}

// =============================================================================
// Backend selection
// =============================================================================

/// Store for timers, messages, and actions.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// Process-local maps.
    Memory(MemoryStore),
    /// `PostgreSQL`.
    Postgres(PostgresPool),
}

/// Store for the status label and visitor counter.
#[derive(Debug, Clone)]
pub enum StatusBackend {
    /// Process-local maps.
    Memory(MemoryStore),
    /// `PostgreSQL`.
    Postgres(PostgresPool),
    /// `Dragonfly`.
    Dragonfly(DragonflyPool),
}

/// Forward a trait method to whichever backend variant is active.
macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr, [$($variant:ident),+]) => {
        match $self {
            $(Self::$variant($backend) => $call,)+
        }
    };
}

impl TimerStore for StoreBackend {
    async fn insert_timer(&self, timer: &Timer) -> Result<(), StoreError> {
        dispatch!(self, s => s.insert_timer(timer).await, [Memory, Postgres])
    }

    async fn get_timer(&self, id: TimerId) -> Result<Option<Timer>, StoreError> {
        dispatch!(self, s => s.get_timer(id).await, [Memory, Postgres])
    }

    async fn list_timers(&self) -> Result<Vec<Timer>, StoreError> {
        dispatch!(self, s => s.list_timers().await, [Memory, Postgres])
    }

    async fn update_timer(&self, timer: &Timer) -> Result<bool, StoreError> {
        dispatch!(self, s => s.update_timer(timer).await, [Memory, Postgres])
    }

    async fn delete_timer(&self, id: TimerId) -> Result<bool, StoreError> {
        dispatch!(self, s => s.delete_timer(id).await, [Memory, Postgres])
    }

    async fn current_timer_id(&self) -> Result<Option<TimerId>, StoreError> {
        dispatch!(self, s => s.current_timer_id().await, [Memory, Postgres])
    }

    async fn set_current_timer(&self, id: Option<TimerId>) -> Result<(), StoreError> {
        dispatch!(self, s => s.set_current_timer(id).await, [Memory, Postgres])
    }

    async fn ping(&self) -> Result<(), StoreError> {
        dispatch!(self, s => TimerStore::ping(s).await, [Memory, Postgres])
    }
}

impl MessageStore for StoreBackend {
    async fn insert_message(&self, message: &TimerMessage) -> Result<(), StoreError> {
        dispatch!(self, s => s.insert_message(message).await, [Memory, Postgres])
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<TimerMessage>, StoreError> {
        dispatch!(self, s => s.get_message(id).await, [Memory, Postgres])
    }

    async fn list_messages(&self, now: DateTime<Utc>) -> Result<Vec<TimerMessage>, StoreError> {
        dispatch!(self, s => s.list_messages(now).await, [Memory, Postgres])
    }

    async fn delete_message(&self, id: MessageId) -> Result<bool, StoreError> {
        dispatch!(self, s => s.delete_message(id).await, [Memory, Postgres])
    }

    async fn purge_expired_messages(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        dispatch!(self, s => s.purge_expired_messages(before).await, [Memory, Postgres])
    }
}

impl ActionStore for StoreBackend {
    async fn insert_action(&self, action: &TimerAction) -> Result<(), StoreError> {
        dispatch!(self, s => s.insert_action(action).await, [Memory, Postgres])
    }

    async fn get_action(&self, id: ActionId) -> Result<Option<TimerAction>, StoreError> {
        dispatch!(self, s => s.get_action(id).await, [Memory, Postgres])
    }

    async fn list_actions(&self, timer_id: Option<TimerId>) -> Result<Vec<TimerAction>, StoreError> {
        dispatch!(self, s => s.list_actions(timer_id).await, [Memory, Postgres])
    }

    async fn update_action(&self, action: &TimerAction) -> Result<bool, StoreError> {
        dispatch!(self, s => s.update_action(action).await, [Memory, Postgres])
    }

    async fn delete_action(&self, id: ActionId) -> Result<bool, StoreError> {
        dispatch!(self, s => s.delete_action(id).await, [Memory, Postgres])
    }

    async fn reset_actions(&self, timer_id: TimerId) -> Result<u64, StoreError> {
        dispatch!(self, s => s.reset_actions(timer_id).await, [Memory, Postgres])
    }

    async fn mark_action_executed(&self, id: ActionId) -> Result<bool, StoreError> {
        dispatch!(self, s => s.mark_action_executed(id).await, [Memory, Postgres])
    }
}

impl StatusStore for StatusBackend {
    async fn get_status(&self, default_label: &str, now: DateTime<Utc>) -> Result<EventStatus, StoreError> {
        dispatch!(self, s => StatusStore::get_status(s, default_label, now).await, [Memory, Postgres, Dragonfly])
    }

    async fn set_status(&self, label: &str, now: DateTime<Utc>) -> Result<EventStatus, StoreError> {
        dispatch!(self, s => StatusStore::set_status(s, label, now).await, [Memory, Postgres, Dragonfly])
    }

    async fn get_visitors(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<VisitorCounter, StoreError> {
        dispatch!(self, s => StatusStore::get_visitors(s, date, now).await, [Memory, Postgres, Dragonfly])
    }

    async fn set_visitors(&self, date: NaiveDate, count: i64, now: DateTime<Utc>) -> Result<VisitorCounter, StoreError> {
        dispatch!(self, s => StatusStore::set_visitors(s, date, count, now).await, [Memory, Postgres, Dragonfly])
    }

    async fn increment_visitors(&self, date: NaiveDate, delta: i64, now: DateTime<Utc>) -> Result<VisitorCounter, StoreError> {
        dispatch!(self, s => StatusStore::increment_visitors(s, date, delta, now).await, [Memory, Postgres, Dragonfly])
    }

    async fn visitor_history(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<VisitorCounter>, StoreError> {
        dispatch!(self, s => StatusStore::visitor_history(s, from, to).await, [Memory, Postgres, Dragonfly])
    }

    async fn ping_status(&self) -> Result<(), StoreError> {
        dispatch!(self, s => s.ping_status().await, [Memory, Postgres, Dragonfly])
    }
}

/// The pair of backends selected by configuration.
#[derive(Debug, Clone)]
pub struct Backends {
    /// Timers, messages, actions.
    pub store: StoreBackend,
    /// Status and visitor counter.
    pub status: StatusBackend,
}

impl Backends {
    /// Both roles served by one fresh in-memory store.
    pub fn memory() -> Self {
        let store = MemoryStore::new();
        Self {
            store: StoreBackend::Memory(store.clone()),
            status: StatusBackend::Memory(store),
        }
    }

    /// Connect the backends named in `config`, running migrations when
    /// `PostgreSQL` is used.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a connection or migration fails.
    pub async fn connect(config: &StoreConfig) -> Result<Self, DbError> {
        let (store, same_status) = match config.backend {
            StoreKind::Memory => {
                let memory = MemoryStore::new();
                (
                    StoreBackend::Memory(memory.clone()),
                    StatusBackend::Memory(memory),
                )
            }
            StoreKind::Postgres => {
                let pool = PostgresPool::connect(
                    &PostgresConfig::new(&config.postgres_url)
                        .with_max_connections(config.max_connections),
                )
                .await?;
                pool.run_migrations().await?;
                (
                    StoreBackend::Postgres(pool.clone()),
                    StatusBackend::Postgres(pool),
                )
            }
        };

        let status = match config.status_backend {
            StatusStoreKind::Same => same_status,
            StatusStoreKind::Dragonfly => {
                StatusBackend::Dragonfly(DragonflyPool::connect(&config.dragonfly_url).await?)
            }
        };

        tracing::info!(
            store = ?config.backend,
            status = ?config.status_backend,
            "Store backends ready"
        );
        Ok(Self { store, status })
    }
}
