//! Countdown projection and text formatting.
//!
//! The display never trusts a reading computed elsewhere. It takes the
//! polled timer row and derives remaining time from its own clock shifted
//! by the sync offset, so every display shows the same value no matter
//! how its local clock drifts.

use std::fmt;

use chrono::{DateTime, Utc};
use eventops_core::timer;
use eventops_types::{Timer, TimerKind, TimerMessage, TimerState};

/// Format milliseconds as `HH:MM:SS`, `MM:SS`, `HH:MM`, or `MM`.
///
/// Hours appear when `show_hours` is set or the value is at least an hour.
/// Partial seconds are truncated. Negative values format as their
/// magnitude; callers add the sign.
pub fn format_duration(ms: i64, show_hours: bool, show_seconds: bool) -> String {
    let total_secs = ms.unsigned_abs() / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if show_hours || hours > 0 {
        out.push_str(&format!("{hours:02}:"));
    }
    out.push_str(&format!("{minutes:02}"));
    if show_seconds {
        out.push_str(&format!(":{seconds:02}"));
    }
    out
}

/// What a display shows at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Timer title.
    pub title: String,
    /// Formatted clock, `-` prefixed once countdown overtime shows a
    /// non-zero value.
    pub text: String,
    /// Color to render the clock in.
    pub color: String,
    /// Whether the countdown has run out.
    pub overtime: bool,
    /// Run state.
    pub state: TimerState,
    /// Message to show under the clock.
    pub message: Option<String>,
    /// Whether the message should flash.
    pub flash: bool,
}

impl Frame {
    /// Project `timer` at `now`, with the newest message that applies to it.
    pub fn project(timer: &Timer, now: DateTime<Utc>, messages: &[TimerMessage]) -> Self {
        let reading = timer::read(timer, now);
        let show_hours = timer::shows_hours(timer, &reading);
        let shown_ms = match timer.kind {
            TimerKind::Countdown => reading.remaining_ms,
            TimerKind::Countup => reading.elapsed_ms,
        };
        let mut text = format_duration(shown_ms, show_hours, timer.show_seconds);
        // No sign until the overtime is visible in the shown units.
        let shows_nonzero = text.bytes().any(|b| matches!(b, b'1'..=b'9'));
        if timer.kind == TimerKind::Countdown && shown_ms < 0 && shows_nonzero {
            text.insert(0, '-');
        }

        let message = messages
            .iter()
            .find(|m| m.timer_id.is_none_or(|id| id == timer.id));

        Self {
            title: timer.title.clone(),
            text,
            color: reading.display_color,
            overtime: reading.overtime,
            state: timer.state,
            message: message
                .map(|m| m.text.clone())
                .or_else(|| timer.message.clone()),
            flash: message.is_some_and(|m| m.flash),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.state.as_str(), self.title, self.text)?;
        if let Some(message) = &self.message {
            write!(f, " | {message}")?;
        }
        Ok(())
    }
}
