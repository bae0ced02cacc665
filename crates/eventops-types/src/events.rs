//! Change notifications streamed to displays.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{ActionId, MessageId, TimerId};
use crate::structs::{EventStatus, Timer, TimerMessage};

/// A change to shared state, published after the store write succeeds.
///
/// Displays that receive one can refresh immediately instead of waiting for
/// their next poll. Polling remains the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DisplayEvent {
    /// A timer was created or its row changed.
    TimerChanged {
        /// The timer as written.
        timer: Timer,
    },
    /// A timer was deleted.
    TimerDeleted {
        /// The deleted timer.
        #[serde(rename = "timerId")]
        timer_id: TimerId,
    },
    /// The current-timer pointer moved.
    CurrentChanged {
        /// The new current timer, if any.
        #[serde(rename = "timerId")]
        timer_id: Option<TimerId>,
    },
    /// A message was broadcast.
    MessageSent {
        /// The stored message.
        message: TimerMessage,
    },
    /// A message was removed.
    MessageDeleted {
        /// The removed message.
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },
    /// The event status label changed.
    StatusChanged {
        /// The new status.
        status: EventStatus,
    },
    /// The visitor count changed.
    VisitorsChanged {
        /// The new count.
        count: i64,
    },
    /// A timer action asked displays to switch color.
    ColorChanged {
        /// Timer whose display color changes.
        #[serde(rename = "timerId")]
        timer_id: TimerId,
        /// The new color.
        color: String,
    },
    /// A timer action fired.
    ActionExecuted {
        /// The action that fired.
        #[serde(rename = "actionId")]
        action_id: ActionId,
        /// Timer it belongs to.
        #[serde(rename = "timerId")]
        timer_id: TimerId,
    },
}

impl DisplayEvent {
    /// Short name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TimerChanged { .. } => "timer_changed",
            Self::TimerDeleted { .. } => "timer_deleted",
            Self::CurrentChanged { .. } => "current_changed",
            Self::MessageSent { .. } => "message_sent",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::StatusChanged { .. } => "status_changed",
            Self::VisitorsChanged { .. } => "visitors_changed",
            Self::ColorChanged { .. } => "color_changed",
            Self::ActionExecuted { .. } => "action_executed",
        }
    }
}
