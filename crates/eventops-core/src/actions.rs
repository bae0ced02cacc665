//! Timer actions: side effects armed at a remaining-time threshold.
//!
//! An action fires once per run. Claiming an action goes through
//! [`ActionStore::mark_action_executed`], a conditional update, so when
//! several server instances run the scheduler only one of them performs
//! the effect. Resetting or freshly starting the timer re-arms its actions.

use std::sync::Arc;

use eventops_types::{
    ActionId, DisplayEvent, NewTimerAction, NewTimerMessage, Timer, TimerAction,
    TimerActionKind, TimerActionPatch, TimerId,
};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::EngineError;
use crate::events::EventBus;
use crate::messages::MessageBoard;
use crate::store::{ActionStore, MessageStore, TimerStore};

/// Coordinator for timer actions.
#[derive(Clone)]
pub struct TimerActions<S> {
    store: S,
    clock: Arc<dyn Clock>,
    events: EventBus,
    board: MessageBoard<S>,
}

impl<S> std::fmt::Debug for TimerActions<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerActions").finish_non_exhaustive()
    }
}

impl<S: TimerStore + ActionStore + MessageStore> TimerActions<S> {
    /// Create the coordinator. Messages posted by actions go through a
    /// [`MessageBoard`] over the same store.
    pub fn new(store: S, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        let board = MessageBoard::new(store.clone(), clock.clone(), events.clone());
        Self {
            store,
            clock,
            events,
            board,
        }
    }

    /// Create an armed action for an existing timer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the timer does not exist, or
    /// [`EngineError::InvalidInput`] if the action has nothing to do.
    pub async fn create(&self, new: NewTimerAction) -> Result<TimerAction, EngineError> {
        if self.store.get_timer(new.timer_id).await?.is_none() {
            return Err(EngineError::not_found("timer", new.timer_id));
        }
        let action = TimerAction {
            id: ActionId::new(),
            timer_id: new.timer_id,
            trigger_ms: new.trigger_ms,
            kind: new.kind,
            message: new.message.filter(|m| !m.trim().is_empty()),
            color: new.color.filter(|c| !c.trim().is_empty()),
            flash: new.flash,
            enabled: new.enabled,
            executed: false,
            created_at: self.clock.now(),
        };
        validate(&action)?;
        self.store.insert_action(&action).await?;
        info!(action_id = %action.id, timer_id = %action.timer_id, trigger_ms = action.trigger_ms, "Timer action created");
        Ok(action)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the action does not exist.
    pub async fn update(&self, patch: TimerActionPatch) -> Result<TimerAction, EngineError> {
        let mut action = self.get(patch.id).await?;
        if let Some(trigger_ms) = patch.trigger_ms {
            action.trigger_ms = trigger_ms;
        }
        if let Some(kind) = patch.kind {
            action.kind = kind;
        }
        if let Some(message) = patch.message {
            action.message = Some(message).filter(|m| !m.trim().is_empty());
        }
        if let Some(color) = patch.color {
            action.color = Some(color).filter(|c| !c.trim().is_empty());
        }
        if let Some(flash) = patch.flash {
            action.flash = flash;
        }
        if let Some(enabled) = patch.enabled {
            action.enabled = enabled;
        }
        validate(&action)?;
        if !self.store.update_action(&action).await? {
            return Err(EngineError::not_found("action", action.id));
        }
        info!(action_id = %action.id, "Timer action updated");
        Ok(action)
    }

    /// Fetch one action.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the action does not exist.
    pub async fn get(&self, id: ActionId) -> Result<TimerAction, EngineError> {
        self.store
            .get_action(id)
            .await?
            .ok_or_else(|| EngineError::not_found("action", id))
    }

    /// Actions of one timer, or of all timers, largest trigger first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the read fails.
    pub async fn list(&self, timer_id: Option<TimerId>) -> Result<Vec<TimerAction>, EngineError> {
        Ok(self.store.list_actions(timer_id).await?)
    }

    /// Delete an action. Returns `false` when it was already gone.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the delete fails.
    pub async fn delete(&self, id: ActionId) -> Result<bool, EngineError> {
        let deleted = self.store.delete_action(id).await?;
        if deleted {
            info!(action_id = %id, "Timer action deleted");
        }
        Ok(deleted)
    }

    /// Re-arm every action of a timer. Returns how many were touched.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the update fails.
    pub async fn reset(&self, timer_id: TimerId) -> Result<u64, EngineError> {
        let touched = self.store.reset_actions(timer_id).await?;
        info!(timer_id = %timer_id, touched, "Timer actions re-armed");
        Ok(touched)
    }

    /// Fire an action by hand, whether or not it already fired this run.
    /// Returns `false` for disabled actions.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the action does not exist.
    pub async fn execute(&self, id: ActionId) -> Result<bool, EngineError> {
        let action = self.get(id).await?;
        if !action.enabled {
            return Ok(false);
        }
        self.perform(&action).await?;
        self.store.mark_action_executed(id).await?;
        Ok(true)
    }

    /// Fire every enabled, unfired action of `timer` whose threshold has
    /// been reached at `remaining_ms`, largest threshold first. Returns the
    /// actions this call fired.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if listing or claiming fails. An
    /// action whose effect fails after it was claimed stays fired and is
    /// logged.
    pub async fn check_due(
        &self,
        timer: &Timer,
        remaining_ms: i64,
    ) -> Result<Vec<TimerAction>, EngineError> {
        let due: Vec<TimerAction> = self
            .store
            .list_actions(Some(timer.id))
            .await?
            .into_iter()
            .filter(|a| a.enabled && !a.executed && a.trigger_ms >= remaining_ms)
            .collect();

        let mut fired = Vec::with_capacity(due.len());
        for mut action in due {
            if !self.store.mark_action_executed(action.id).await? {
                continue;
            }
            if let Err(e) = self.perform(&action).await {
                warn!(action_id = %action.id, error = %e, "Timer action effect failed");
            }
            action.executed = true;
            fired.push(action);
        }
        Ok(fired)
    }

    async fn perform(&self, action: &TimerAction) -> Result<(), EngineError> {
        let posts = action.kind.posts_message();
        if let Some(text) = action.message.as_ref().filter(|_| posts) {
            self.board
                .send(NewTimerMessage {
                    text: text.clone(),
                    color: action.color.clone(),
                    flash: action.flash,
                    timer_id: Some(action.timer_id),
                    ttl_secs: None,
                })
                .await?;
        }
        let recolors = action.kind.changes_color();
        if let Some(color) = action.color.as_ref().filter(|_| recolors) {
            self.events.publish(DisplayEvent::ColorChanged {
                timer_id: action.timer_id,
                color: color.clone(),
            });
        }
        info!(action_id = %action.id, timer_id = %action.timer_id, kind = action.kind.as_str(), "Timer action executed");
        self.events.publish(DisplayEvent::ActionExecuted {
            action_id: action.id,
            timer_id: action.timer_id,
        });
        Ok(())
    }
}

fn validate(action: &TimerAction) -> Result<(), EngineError> {
    let missing = match action.kind {
        TimerActionKind::Message if action.message.is_none() => {
            Some("message action needs a message")
        }
        TimerActionKind::Color if action.color.is_none() => Some("color action needs a color"),
        TimerActionKind::Both if action.message.is_none() && action.color.is_none() => {
            Some("action needs a message or a color")
        }
        _ => None,
    };
    missing.map_or(Ok(()), |reason| Err(EngineError::InvalidInput(reason.to_owned())))
}
