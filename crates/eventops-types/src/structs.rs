//! Core entity structs for the EventOps dashboard.
//!
//! Covers timers and their derived readings, broadcast messages, timer
//! actions, the event status singleton, and the per-day visitor counters.
//! Every struct serializes with `camelCase` field names to match the HTTP
//! wire format.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{TimerActionKind, TimerKind, TimerState};
use crate::ids::{ActionId, MessageId, TimerId};

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// A persisted countdown (or count-up) timer.
///
/// The remaining time is never stored. It is derived at read time from
/// `duration_ms`, `elapsed_ms`, and `started_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Timer {
    /// Unique identifier.
    pub id: TimerId,
    /// Title shown above the countdown.
    pub title: String,
    /// Presentation direction.
    pub kind: TimerKind,
    /// Configured length in milliseconds. Zero and negative are accepted.
    pub duration_ms: i64,
    /// Current run state.
    pub state: TimerState,
    /// Start instant of the current run; `Some` iff `state` is running.
    pub started_at: Option<DateTime<Utc>>,
    /// Time accumulated up to the last pause, in milliseconds.
    pub elapsed_ms: i64,
    /// Whether displays render seconds.
    pub show_seconds: bool,
    /// Whether displays play a sound at zero.
    pub play_sound: bool,
    /// Normal display color.
    pub color: String,
    /// Display color once a countdown runs past zero.
    pub overtime_color: String,
    /// Optional subtitle shown under the countdown.
    pub message: Option<String>,
    /// Whether this timer is the one displays show.
    pub is_current: bool,
    /// When the timer was created.
    pub created_at: DateTime<Utc>,
    /// When the timer row was last written.
    pub updated_at: DateTime<Utc>,
}

/// Editable timer settings.
///
/// Used both to create a timer (absent fields take configured defaults) and
/// to update one (absent fields are left unchanged).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct TimerSettings {
    /// Title shown above the countdown.
    pub title: Option<String>,
    /// Presentation direction.
    pub kind: Option<TimerKind>,
    /// Length in milliseconds.
    pub duration_ms: Option<i64>,
    /// Normal display color.
    pub color: Option<String>,
    /// Overtime display color.
    pub overtime_color: Option<String>,
    /// Whether displays render seconds.
    pub show_seconds: Option<bool>,
    /// Whether displays play a sound at zero.
    pub play_sound: Option<bool>,
    /// Optional subtitle.
    pub message: Option<String>,
    /// Make the timer current as part of the write.
    pub current: Option<bool>,
}

/// A point-in-time projection of a timer. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TimerReading {
    /// Milliseconds left; negative once a countdown is in overtime.
    pub remaining_ms: i64,
    /// Milliseconds counted so far, including the live run.
    pub elapsed_ms: i64,
    /// Whether a countdown has passed zero.
    pub overtime: bool,
    /// Color displays should use right now.
    pub display_color: String,
}

// ---------------------------------------------------------------------------
// Broadcast messages
// ---------------------------------------------------------------------------

/// A message broadcast to every display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TimerMessage {
    /// Unique identifier.
    pub id: MessageId,
    /// Message body.
    pub text: String,
    /// Text color; displays fall back to white when absent.
    pub color: Option<String>,
    /// Whether displays should flash the message. Stored only.
    pub flash: bool,
    /// Timer the message is attached to, if any.
    pub timer_id: Option<TimerId>,
    /// When the message was sent.
    pub created_at: DateTime<Utc>,
    /// When the message stops being listed, if it expires.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request payload for sending a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct NewTimerMessage {
    /// Message body. Must not be blank.
    pub text: String,
    /// Text color.
    pub color: Option<String>,
    /// Whether displays should flash the message.
    pub flash: bool,
    /// Timer to attach the message to.
    pub timer_id: Option<TimerId>,
    /// Seconds until the message expires; never when absent.
    pub ttl_secs: Option<u32>,
}

// ---------------------------------------------------------------------------
// Event status and visitor counter
// ---------------------------------------------------------------------------

/// The event-wide status label (singleton).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct EventStatus {
    /// Free-form label such as `preparing` or `open`.
    pub label: String,
    /// When the label was last written.
    pub updated_at: DateTime<Utc>,
}

/// The venue visitor counter for one event day.
///
/// There is one row per `event_date`; the row for today (in the server's
/// configured timezone) is the live counter, older rows are history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct VisitorCounter {
    /// Event day this count belongs to.
    pub event_date: NaiveDate,
    /// Current count. Increments may take it below zero.
    pub count: i64,
    /// When the count was last written.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Timer actions
// ---------------------------------------------------------------------------

/// A scheduled side effect that fires once a timer's remaining time drops
/// to `trigger_ms` or below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TimerAction {
    /// Unique identifier.
    pub id: ActionId,
    /// Timer this action belongs to.
    pub timer_id: TimerId,
    /// Remaining-time threshold in milliseconds.
    pub trigger_ms: i64,
    /// What the action does.
    pub kind: TimerActionKind,
    /// Message to post for `message` and `both` actions.
    pub message: Option<String>,
    /// Color to apply for `color` and `both` actions.
    pub color: Option<String>,
    /// Whether the posted message flashes.
    pub flash: bool,
    /// Disabled actions never fire.
    pub enabled: bool,
    /// Set once the action has fired in the current run.
    pub executed: bool,
    /// When the action was created.
    pub created_at: DateTime<Utc>,
}

/// Request payload for creating a timer action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct NewTimerAction {
    /// Timer the action belongs to.
    pub timer_id: TimerId,
    /// Remaining-time threshold in milliseconds.
    pub trigger_ms: i64,
    /// What the action does.
    #[serde(default)]
    pub kind: TimerActionKind,
    /// Message to post.
    #[serde(default)]
    pub message: Option<String>,
    /// Color to apply.
    #[serde(default)]
    pub color: Option<String>,
    /// Whether the posted message flashes.
    #[serde(default)]
    pub flash: bool,
    /// Whether the action is armed.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Partial update for an existing timer action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TimerActionPatch {
    /// Action to update.
    pub id: ActionId,
    /// New threshold.
    #[serde(default)]
    pub trigger_ms: Option<i64>,
    /// New kind.
    #[serde(default)]
    pub kind: Option<TimerActionKind>,
    /// New message.
    #[serde(default)]
    pub message: Option<String>,
    /// New color.
    #[serde(default)]
    pub color: Option<String>,
    /// New flash flag.
    #[serde(default)]
    pub flash: Option<bool>,
    /// New enabled flag.
    #[serde(default)]
    pub enabled: Option<bool>,
}

const fn default_true() -> bool {
    true
}
