//! Process-local store.
//!
//! Backs every store trait with maps behind one async mutex. Each trait call
//! takes the lock once, so a read-modify-write such as
//! [`StatusStore::increment_visitors`] cannot interleave with another call.
//! Used for single-instance deployments and for tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use eventops_types::{
    ActionId, EventStatus, MessageId, Timer, TimerAction, TimerId, TimerMessage, VisitorCounter,
};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{ActionStore, MessageStore, StatusStore, TimerStore};

#[derive(Debug, Default)]
struct MemoryState {
    timers: BTreeMap<TimerId, Timer>,
    current: Option<TimerId>,
    messages: BTreeMap<MessageId, TimerMessage>,
    actions: BTreeMap<ActionId, TimerAction>,
    status: Option<EventStatus>,
    visitors: BTreeMap<NaiveDate, VisitorCounter>,
}

impl MemoryState {
    fn with_current_flag(&self, mut timer: Timer) -> Timer {
        timer.is_current = self.current == Some(timer.id);
        timer
    }
}

/// In-memory implementation of every store trait.
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimerStore for MemoryStore {
    async fn insert_timer(&self, timer: &Timer) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.timers.insert(timer.id, timer.clone());
        Ok(())
    }

    async fn get_timer(&self, id: TimerId) -> Result<Option<Timer>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .timers
            .get(&id)
            .cloned()
            .map(|t| state.with_current_flag(t)))
    }

    async fn list_timers(&self) -> Result<Vec<Timer>, StoreError> {
        let state = self.inner.lock().await;
        let mut timers: Vec<Timer> = state
            .timers
            .values()
            .cloned()
            .map(|t| state.with_current_flag(t))
            .collect();
        timers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(timers)
    }

    async fn update_timer(&self, timer: &Timer) -> Result<bool, StoreError> {
        let mut state = self.inner.lock().await;
        match state.timers.get_mut(&timer.id) {
            Some(row) => {
                *row = timer.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_timer(&self, id: TimerId) -> Result<bool, StoreError> {
        let mut state = self.inner.lock().await;
        let removed = state.timers.remove(&id).is_some();
        if removed {
            state.actions.retain(|_, a| a.timer_id != id);
            for message in state.messages.values_mut() {
                if message.timer_id == Some(id) {
                    message.timer_id = None;
                }
            }
            if state.current == Some(id) {
                state.current = None;
            }
        }
        Ok(removed)
    }

    async fn current_timer_id(&self) -> Result<Option<TimerId>, StoreError> {
        Ok(self.inner.lock().await.current)
    }

    async fn set_current_timer(&self, id: Option<TimerId>) -> Result<(), StoreError> {
        self.inner.lock().await.current = id;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl MessageStore for MemoryStore {
    async fn insert_message(&self, message: &TimerMessage) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<TimerMessage>, StoreError> {
        Ok(self.inner.lock().await.messages.get(&id).cloned())
    }

    async fn list_messages(&self, now: DateTime<Utc>) -> Result<Vec<TimerMessage>, StoreError> {
        let state = self.inner.lock().await;
        let mut messages: Vec<TimerMessage> = state
            .messages
            .values()
            .filter(|m| m.expires_at.is_none_or(|at| at > now))
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(messages)
    }

    async fn delete_message(&self, id: MessageId) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.messages.remove(&id).is_some())
    }

    async fn purge_expired_messages(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.inner.lock().await;
        let len = state.messages.len();
        state
            .messages
            .retain(|_, m| m.expires_at.is_none_or(|at| at > before));
        Ok(u64::try_from(len.saturating_sub(state.messages.len())).unwrap_or(u64::MAX))
    }
}

impl ActionStore for MemoryStore {
    async fn insert_action(&self, action: &TimerAction) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.actions.insert(action.id, action.clone());
        Ok(())
    }

    async fn get_action(&self, id: ActionId) -> Result<Option<TimerAction>, StoreError> {
        Ok(self.inner.lock().await.actions.get(&id).cloned())
    }

    async fn list_actions(&self, timer_id: Option<TimerId>) -> Result<Vec<TimerAction>, StoreError> {
        let state = self.inner.lock().await;
        let mut actions: Vec<TimerAction> = state
            .actions
            .values()
            .filter(|a| timer_id.is_none_or(|id| a.timer_id == id))
            .cloned()
            .collect();
        actions.sort_by(|a, b| b.trigger_ms.cmp(&a.trigger_ms).then(a.id.cmp(&b.id)));
        Ok(actions)
    }

    async fn update_action(&self, action: &TimerAction) -> Result<bool, StoreError> {
        let mut state = self.inner.lock().await;
        match state.actions.get_mut(&action.id) {
            Some(row) => {
                *row = action.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_action(&self, id: ActionId) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.actions.remove(&id).is_some())
    }

    async fn reset_actions(&self, timer_id: TimerId) -> Result<u64, StoreError> {
        let mut state = self.inner.lock().await;
        let mut touched: u64 = 0;
        for action in state.actions.values_mut().filter(|a| a.timer_id == timer_id) {
            action.executed = false;
            touched = touched.saturating_add(1);
        }
        Ok(touched)
    }

    async fn mark_action_executed(&self, id: ActionId) -> Result<bool, StoreError> {
        let mut state = self.inner.lock().await;
        match state.actions.get_mut(&id) {
            Some(action) if !action.executed => {
                action.executed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl StatusStore for MemoryStore {
    async fn get_status(
        &self,
        default_label: &str,
        now: DateTime<Utc>,
    ) -> Result<EventStatus, StoreError> {
        let mut state = self.inner.lock().await;
        let status = state.status.get_or_insert_with(|| EventStatus {
            label: default_label.to_owned(),
            updated_at: now,
        });
        Ok(status.clone())
    }

    async fn set_status(&self, label: &str, now: DateTime<Utc>) -> Result<EventStatus, StoreError> {
        let status = EventStatus {
            label: label.to_owned(),
            updated_at: now,
        };
        self.inner.lock().await.status = Some(status.clone());
        Ok(status)
    }

    async fn get_visitors(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<VisitorCounter, StoreError> {
        let mut state = self.inner.lock().await;
        Ok(*state.visitors.entry(date).or_insert(VisitorCounter {
            event_date: date,
            count: 0,
            updated_at: now,
        }))
    }

    async fn set_visitors(
        &self,
        date: NaiveDate,
        count: i64,
        now: DateTime<Utc>,
    ) -> Result<VisitorCounter, StoreError> {
        let counter = VisitorCounter {
            event_date: date,
            count,
            updated_at: now,
        };
        self.inner.lock().await.visitors.insert(date, counter);
        Ok(counter)
    }

    async fn increment_visitors(
        &self,
        date: NaiveDate,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<VisitorCounter, StoreError> {
        let mut state = self.inner.lock().await;
        let current = state.visitors.get(&date).map_or(0, |v| v.count);
        let count = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::Unavailable("visitor counter overflow".to_owned()))?;
        let counter = VisitorCounter {
            event_date: date,
            count,
            updated_at: now,
        };
        state.visitors.insert(date, counter);
        Ok(counter)
    }

    async fn visitor_history(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<VisitorCounter>, StoreError> {
        let state = self.inner.lock().await;
        if from > to {
            return Ok(Vec::new());
        }
        Ok(state.visitors.range(from..=to).rev().map(|(_, v)| *v).collect())
    }

    async fn ping_status(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
