//! Timer engine: the run-state machine over the timer store.
//!
//! ```text
//! idle --start--> running --pause--> paused --start--> running ...
//!   ^                                                      |
//!   +----------------------- reset ------------------------+
//! ```
//!
//! The engine holds no authoritative state. Each control operation reads
//! the row, applies one transition, and writes it back (last write wins).
//! Remaining time is derived on read by [`read`] and never stored, so any
//! number of pollers can read concurrently without touching the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use eventops_types::{
    DisplayEvent, Timer, TimerId, TimerKind, TimerReading, TimerSettings, TimerState,
};
use tracing::info;

use crate::clock::{Clock, millis_between};
use crate::config::TimerConfig;
use crate::error::EngineError;
use crate::events::EventBus;
use crate::store::{ActionStore, TimerStore};

/// Countup timers past this many milliseconds show hours.
const HOUR_MS: i64 = 3_600_000;

// ---------------------------------------------------------------------------
// Pure derivations
// ---------------------------------------------------------------------------

/// Milliseconds counted at `now`, including the live run if running.
///
/// A start instant in the future (clock skew between writers) contributes
/// nothing rather than a negative amount.
pub fn elapsed_ms(timer: &Timer, now: DateTime<Utc>) -> i64 {
    match (timer.state, timer.started_at) {
        (TimerState::Running, Some(started)) => timer
            .elapsed_ms
            .saturating_add(millis_between(started, now).max(0)),
        _ => timer.elapsed_ms,
    }
}

/// Milliseconds left at `now`: `duration - elapsed`. May be negative.
pub fn remaining_ms(timer: &Timer, now: DateTime<Utc>) -> i64 {
    timer.duration_ms.saturating_sub(elapsed_ms(timer, now))
}

/// Full point-in-time projection of `timer` at `now`. Never mutates.
pub fn read(timer: &Timer, now: DateTime<Utc>) -> TimerReading {
    let elapsed = elapsed_ms(timer, now);
    let remaining = timer.duration_ms.saturating_sub(elapsed);
    let overtime = timer.state != TimerState::Idle
        && match timer.kind {
            TimerKind::Countdown => remaining <= 0,
            TimerKind::Countup => elapsed > timer.duration_ms,
        };
    TimerReading {
        remaining_ms: remaining,
        elapsed_ms: elapsed,
        overtime,
        display_color: if overtime {
            timer.overtime_color.clone()
        } else {
            timer.color.clone()
        },
    }
}

/// Whether a display should render an hours field for this reading.
pub const fn shows_hours(timer: &Timer, reading: &TimerReading) -> bool {
    match timer.kind {
        TimerKind::Countdown => timer.duration_ms > HOUR_MS,
        TimerKind::Countup => reading.elapsed_ms > HOUR_MS,
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless coordinator for timer control operations.
#[derive(Clone)]
pub struct TimerEngine<S> {
    store: S,
    clock: Arc<dyn Clock>,
    defaults: TimerConfig,
    events: EventBus,
}

impl<S> std::fmt::Debug for TimerEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl<S: TimerStore + ActionStore> TimerEngine<S> {
    /// Create an engine over `store`.
    pub fn new(store: S, clock: Arc<dyn Clock>, defaults: TimerConfig, events: EventBus) -> Self {
        Self {
            store,
            clock,
            defaults,
            events,
        }
    }

    /// The current instant according to the engine's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Derive the reading of `timer` at the engine's current instant.
    pub fn reading(&self, timer: &Timer) -> TimerReading {
        read(timer, self.clock.now())
    }

    /// Create an idle timer. Absent settings take configured defaults;
    /// `settings.current` also makes it current.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the write fails.
    pub async fn create(&self, settings: TimerSettings) -> Result<Timer, EngineError> {
        self.create_with_id(TimerId::new(), settings).await
    }

    async fn create_with_id(
        &self,
        id: TimerId,
        settings: TimerSettings,
    ) -> Result<Timer, EngineError> {
        let now = self.clock.now();
        let make_current = settings.current.unwrap_or(false);
        let mut timer = Timer {
            id,
            title: non_blank(settings.title).unwrap_or_else(|| self.defaults.default_title.clone()),
            kind: settings.kind.unwrap_or_default(),
            duration_ms: settings
                .duration_ms
                .unwrap_or(self.defaults.default_duration_ms),
            state: TimerState::Idle,
            started_at: None,
            elapsed_ms: 0,
            show_seconds: settings.show_seconds.unwrap_or(true),
            play_sound: settings.play_sound.unwrap_or(false),
            color: non_blank(settings.color).unwrap_or_else(|| self.defaults.default_color.clone()),
            overtime_color: non_blank(settings.overtime_color)
                .unwrap_or_else(|| self.defaults.default_overtime_color.clone()),
            message: non_blank(settings.message),
            is_current: false,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_timer(&timer).await?;
        info!(timer_id = %timer.id, duration_ms = timer.duration_ms, "Timer created");

        if make_current {
            self.store.set_current_timer(Some(timer.id)).await?;
            timer.is_current = true;
            self.events.publish(DisplayEvent::CurrentChanged {
                timer_id: Some(timer.id),
            });
        }
        self.events.publish(DisplayEvent::TimerChanged {
            timer: timer.clone(),
        });
        Ok(timer)
    }

    /// Update the editable settings of a timer, creating it under `id` when
    /// it does not exist (or under a fresh id when `id` is `None`). The saved
    /// timer becomes current. Run state is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if a store call fails.
    pub async fn save(
        &self,
        id: Option<TimerId>,
        settings: TimerSettings,
    ) -> Result<Timer, EngineError> {
        let existing = match id {
            Some(id) => self.store.get_timer(id).await?,
            None => None,
        };
        let Some(mut timer) = existing else {
            let settings = TimerSettings {
                current: Some(true),
                ..settings
            };
            return self
                .create_with_id(id.unwrap_or_default(), settings)
                .await;
        };

        if let Some(title) = non_blank(settings.title) {
            timer.title = title;
        }
        if let Some(kind) = settings.kind {
            timer.kind = kind;
        }
        if let Some(duration_ms) = settings.duration_ms {
            timer.duration_ms = duration_ms;
        }
        if let Some(color) = non_blank(settings.color) {
            timer.color = color;
        }
        if let Some(color) = non_blank(settings.overtime_color) {
            timer.overtime_color = color;
        }
        if let Some(show) = settings.show_seconds {
            timer.show_seconds = show;
        }
        if let Some(play) = settings.play_sound {
            timer.play_sound = play;
        }
        if let Some(message) = settings.message {
            timer.message = non_blank(Some(message));
        }
        timer.updated_at = self.clock.now();

        let timer = self.write(timer).await?;
        info!(timer_id = %timer.id, "Timer settings saved");
        self.set_current(timer.id).await
    }

    /// Start or resume a timer and make it current.
    ///
    /// Idempotent when already running: the start instant is not moved.
    /// From idle the accumulated time is cleared and the timer's actions
    /// are re-armed; from paused the accumulated time is kept.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the timer does not exist.
    pub async fn start(&self, id: TimerId) -> Result<Timer, EngineError> {
        let timer = self.load(id).await?;
        if timer.state == TimerState::Running {
            if timer.is_current {
                return Ok(timer);
            }
            return self.set_current(id).await;
        }

        let now = self.clock.now();
        let from = timer.state;
        let mut next = timer;
        if from == TimerState::Idle {
            next.elapsed_ms = 0;
            self.store.reset_actions(id).await?;
        }
        next.state = TimerState::Running;
        next.started_at = Some(now);
        next.updated_at = now;

        let next = self.write(next).await?;
        info!(timer_id = %id, from = from.as_str(), elapsed_ms = next.elapsed_ms, "Timer started");
        self.set_current(id).await
    }

    /// Pause a running timer, folding the live run into the accumulated
    /// time. A no-op returning the stored row when paused or idle.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the timer does not exist.
    pub async fn pause(&self, id: TimerId) -> Result<Timer, EngineError> {
        let timer = self.load(id).await?;
        if timer.state != TimerState::Running {
            return Ok(timer);
        }

        let now = self.clock.now();
        let mut next = timer;
        next.elapsed_ms = elapsed_ms(&next, now);
        next.started_at = None;
        next.state = TimerState::Paused;
        next.updated_at = now;

        let next = self.write(next).await?;
        info!(timer_id = %id, elapsed_ms = next.elapsed_ms, "Timer paused");
        Ok(next)
    }

    /// Return a timer to idle with nothing accumulated, from any state, and
    /// re-arm its actions.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the timer does not exist.
    pub async fn reset(&self, id: TimerId) -> Result<Timer, EngineError> {
        let mut next = self.load(id).await?;
        next.elapsed_ms = 0;
        next.started_at = None;
        next.state = TimerState::Idle;
        next.updated_at = self.clock.now();

        let next = self.write(next).await?;
        self.store.reset_actions(id).await?;
        info!(timer_id = %id, "Timer reset");
        Ok(next)
    }

    /// Permanently delete a timer. If it was current, nothing is current
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the timer does not exist.
    pub async fn delete(&self, id: TimerId) -> Result<(), EngineError> {
        if !self.store.delete_timer(id).await? {
            return Err(EngineError::not_found("timer", id));
        }
        info!(timer_id = %id, "Timer deleted");
        self.events.publish(DisplayEvent::TimerDeleted { timer_id: id });
        Ok(())
    }

    /// Make `id` the single current timer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the timer does not exist.
    pub async fn set_current(&self, id: TimerId) -> Result<Timer, EngineError> {
        let mut timer = self.load(id).await?;
        self.store.set_current_timer(Some(id)).await?;
        timer.is_current = true;
        info!(timer_id = %id, "Current timer selected");
        self.events.publish(DisplayEvent::CurrentChanged { timer_id: Some(id) });
        Ok(timer)
    }

    /// The current timer, or `None` when no timer is current.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if a store call fails.
    pub async fn current(&self) -> Result<Option<Timer>, EngineError> {
        let Some(id) = self.store.current_timer_id().await? else {
            return Ok(None);
        };
        Ok(self.store.get_timer(id).await?)
    }

    /// Fetch one timer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the timer does not exist.
    pub async fn get(&self, id: TimerId) -> Result<Timer, EngineError> {
        self.load(id).await
    }

    /// All timers, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the read fails.
    pub async fn all(&self) -> Result<Vec<Timer>, EngineError> {
        Ok(self.store.list_timers().await?)
    }

    /// Round-trip the timer store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the store is unreachable.
    pub async fn ping(&self) -> Result<(), EngineError> {
        Ok(self.store.ping().await?)
    }

    async fn load(&self, id: TimerId) -> Result<Timer, EngineError> {
        self.store
            .get_timer(id)
            .await?
            .ok_or_else(|| EngineError::not_found("timer", id))
    }

    async fn write(&self, timer: Timer) -> Result<Timer, EngineError> {
        if !self.store.update_timer(&timer).await? {
            return Err(EngineError::not_found("timer", timer.id));
        }
        self.events.publish(DisplayEvent::TimerChanged {
            timer: timer.clone(),
        });
        Ok(timer)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::clock::ManualClock;
    use crate::memory::MemoryStore;

    use super::*;

    fn engine() -> (TimerEngine<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        let engine = TimerEngine::new(
            MemoryStore::new(),
            clock.clone(),
            TimerConfig::default(),
            EventBus::default(),
        );
        (engine, clock)
    }

    fn minute() -> TimerSettings {
        TimerSettings {
            duration_ms: Some(60_000),
            ..TimerSettings::default()
        }
    }

    async fn remaining(engine: &TimerEngine<MemoryStore>, id: TimerId) -> Option<i64> {
        let timer = engine.get(id).await.ok()?;
        Some(engine.reading(&timer).remaining_ms)
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let (engine, _) = engine();
        let timer = engine.create(TimerSettings::default()).await.unwrap();
        assert_eq!(timer.title, "Countdown");
        assert_eq!(timer.duration_ms, 300_000);
        assert_eq!(timer.state, TimerState::Idle);
        assert_eq!(timer.color, "#3b82f6");
        assert_eq!(timer.overtime_color, "#ef4444");
        assert!(timer.show_seconds);
        assert!(!timer.play_sound);
        assert!(!timer.is_current);
    }

    #[tokio::test]
    async fn start_pause_resume_reset_scenario() {
        let (engine, clock) = engine();
        let timer = engine.create(minute()).await.unwrap();
        let id = timer.id;

        assert!(engine.start(id).await.is_ok());
        clock.advance_ms(10_000);
        assert_eq!(remaining(&engine, id).await, Some(50_000));

        assert!(engine.pause(id).await.is_ok());
        clock.advance_ms(30_000);
        assert_eq!(remaining(&engine, id).await, Some(50_000));

        assert!(engine.start(id).await.is_ok());
        clock.advance_ms(5_000);
        assert_eq!(remaining(&engine, id).await, Some(45_000));

        let reset = engine.reset(id).await.ok();
        assert_eq!(reset.as_ref().map(|t| t.state), Some(TimerState::Idle));
        assert_eq!(remaining(&engine, id).await, Some(60_000));
    }

    #[tokio::test]
    async fn start_is_idempotent_while_running() {
        let (engine, clock) = engine();
        let timer = engine.create(minute()).await.unwrap();
        let first = engine.start(timer.id).await.ok().and_then(|t| t.started_at);
        clock.advance_ms(2_000);
        let second = engine.start(timer.id).await.ok().and_then(|t| t.started_at);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn pause_twice_keeps_accumulated_time() {
        let (engine, clock) = engine();
        let timer = engine.create(minute()).await.unwrap();
        assert!(engine.start(timer.id).await.is_ok());
        clock.advance_ms(7_000);
        let first = engine.pause(timer.id).await.ok().map(|t| t.elapsed_ms);
        clock.advance_ms(7_000);
        let second = engine.pause(timer.id).await.ok().map(|t| t.elapsed_ms);
        assert_eq!(first, Some(7_000));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn pause_idle_timer_is_noop() {
        let (engine, _) = engine();
        let timer = engine.create(minute()).await.unwrap();
        let paused = engine.pause(timer.id).await.ok();
        assert_eq!(paused.map(|t| t.state), Some(TimerState::Idle));
    }

    #[tokio::test]
    async fn unknown_timer_is_not_found() {
        let (engine, _) = engine();
        let id = TimerId::new();
        assert!(matches!(engine.start(id).await, Err(EngineError::NotFound { .. })));
        assert!(matches!(engine.pause(id).await, Err(EngineError::NotFound { .. })));
        assert!(matches!(engine.reset(id).await, Err(EngineError::NotFound { .. })));
        assert!(matches!(engine.delete(id).await, Err(EngineError::NotFound { .. })));
    }

    #[tokio::test]
    async fn only_one_timer_is_current() {
        let (engine, _) = engine();
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(engine.create(minute()).await.unwrap().id);
        }
        for id in ids.iter().chain(ids.iter().rev()) {
            assert!(engine.set_current(*id).await.is_ok());
            let all = engine.all().await.unwrap();
            let current: Vec<TimerId> = all.iter().filter(|t| t.is_current).map(|t| t.id).collect();
            assert_eq!(current, vec![*id]);
        }
    }

    #[tokio::test]
    async fn deleting_current_timer_leaves_no_current() {
        let (engine, _) = engine();
        let timer = engine.create(minute()).await.unwrap();
        assert!(engine.start(timer.id).await.is_ok());
        assert!(engine.current().await.ok().flatten().is_some());

        assert!(engine.delete(timer.id).await.is_ok());
        let current = engine.current().await;
        assert!(current.is_ok());
        assert!(current.ok().flatten().is_none());
    }

    #[tokio::test]
    async fn zero_duration_reads_overtime_immediately() {
        let (engine, clock) = engine();
        let settings = TimerSettings {
            duration_ms: Some(0),
            ..TimerSettings::default()
        };
        let timer = engine.create(settings).await.unwrap();
        let running = engine.start(timer.id).await.unwrap();
        clock.advance_ms(1_500);
        let reading = engine.reading(&running);
        assert_eq!(reading.remaining_ms, -1_500);
        assert!(reading.overtime);
        assert_eq!(reading.display_color, "#ef4444");
    }

    #[tokio::test]
    async fn save_updates_settings_and_selects() {
        let (engine, _) = engine();
        let timer = engine.create(minute()).await.unwrap();
        let settings = TimerSettings {
            title: Some("Q&A".to_owned()),
            duration_ms: Some(120_000),
            ..TimerSettings::default()
        };
        let saved = engine.save(Some(timer.id), settings).await.ok();
        assert_eq!(saved.as_ref().map(|t| t.title.as_str()), Some("Q&A"));
        assert_eq!(saved.as_ref().map(|t| t.duration_ms), Some(120_000));
        assert_eq!(saved.map(|t| t.is_current), Some(true));

        let created = engine.save(None, TimerSettings::default()).await.ok();
        assert_eq!(created.map(|t| t.is_current), Some(true));
    }

    #[test]
    fn countup_overtime_after_duration() {
        let start = DateTime::from_timestamp_millis(0).unwrap();
        let timer = Timer {
            id: TimerId::new(),
            title: "up".to_owned(),
            kind: TimerKind::Countup,
            duration_ms: 1_000,
            state: TimerState::Running,
            started_at: Some(start),
            elapsed_ms: 0,
            show_seconds: true,
            play_sound: false,
            color: "a".to_owned(),
            overtime_color: "b".to_owned(),
            message: None,
            is_current: true,
            created_at: start,
            updated_at: start,
        };
        let at = |ms| DateTime::from_timestamp_millis(ms).unwrap();
        assert!(!read(&timer, at(1_000)).overtime);
        let late = read(&timer, at(1_001));
        assert!(late.overtime);
        assert_eq!(late.elapsed_ms, 1_001);
        assert_eq!(late.display_color, "b");
        assert!(!shows_hours(&timer, &late));
    }
}
