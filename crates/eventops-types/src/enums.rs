//! Enumeration types for the EventOps dashboard.
//!
//! Every enum serializes in `snake_case` so the wire format, the database
//! text columns, and the generated `TypeScript` unions all agree.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Timer run state
// ---------------------------------------------------------------------------

/// The run state of a timer.
///
/// There is no "finished" state: a countdown that reaches zero keeps
/// running and reports a non-positive remaining time (overtime). Only
/// deletion removes a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TimerState {
    /// Created or reset; never started since.
    Idle,
    /// Counting; the start instant is set.
    Running,
    /// Stopped with the elapsed time retained.
    Paused,
}

impl TimerState {
    /// Stable lowercase name used in storage and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }

    /// Parse the storage name back into a state.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Timer kind
// ---------------------------------------------------------------------------

/// Direction in which a timer is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TimerKind {
    /// Counts down from the configured duration; goes into overtime at zero.
    #[default]
    Countdown,
    /// Counts up from zero towards the configured duration.
    Countup,
}

impl TimerKind {
    /// Stable lowercase name used in storage and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Countdown => "countdown",
            Self::Countup => "countup",
        }
    }

    /// Parse the storage name back into a kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "countdown" => Some(Self::Countdown),
            "countup" => Some(Self::Countup),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Timer action kind
// ---------------------------------------------------------------------------

/// What a timer action does when its trigger point is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TimerActionKind {
    /// Post a message to the display.
    #[default]
    Message,
    /// Change the display color of the timer.
    Color,
    /// Post a message and change the color.
    Both,
}

impl TimerActionKind {
    /// Stable lowercase name used in storage and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Color => "color",
            Self::Both => "both",
        }
    }

    /// Parse the storage name back into a kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "message" => Some(Self::Message),
            "color" => Some(Self::Color),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    /// Whether this action posts a message.
    pub const fn posts_message(self) -> bool {
        matches!(self, Self::Message | Self::Both)
    }

    /// Whether this action changes the display color.
    pub const fn changes_color(self) -> bool {
        matches!(self, Self::Color | Self::Both)
    }
}

// ---------------------------------------------------------------------------
// Session role
// ---------------------------------------------------------------------------

/// Role attached to an authenticated session.
///
/// Ordered by privilege: `Staff < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SessionRole {
    /// Venue staff: may count visitors.
    Staff,
    /// Event administrator: may control timers, messages, and status.
    Admin,
}

impl SessionRole {
    /// Stable lowercase name used in storage and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }
}
