//! Timer rows and the current-timer pointer.
//!
//! The pointer is a single row (`current_timer.id = 1`) updated with an
//! upsert, so "exactly one current timer" holds without any locking in the
//! engine. The foreign key is `ON DELETE SET NULL`, so deleting the current
//! timer clears the pointer in the same statement.

use chrono::{DateTime, Utc};
use eventops_types::{Timer, TimerId, TimerKind, TimerState};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Columns selected for a [`TimerRow`]; `is_current` comes from the join.
const TIMER_COLUMNS: &str = r"t.id, t.title, t.kind::TEXT AS kind, t.duration_ms, t.state::TEXT AS state,
    t.started_at, t.elapsed_ms, t.show_seconds, t.play_sound, t.color, t.overtime_color, t.message,
    (c.timer_id IS NOT NULL) AS is_current, t.created_at, t.updated_at";

/// Operations on the `timers` and `current_timer` tables.
pub struct TimerTable<'a> {
    pool: &'a PgPool,
}

impl<'a> TimerTable<'a> {
    /// Create a table handle bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new timer.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, timer: &Timer) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO timers (id, title, kind, duration_ms, state, started_at, elapsed_ms,
                                  show_seconds, play_sound, color, overtime_color, message, created_at, updated_at)
              VALUES ($1, $2, $3::timer_kind, $4, $5::timer_state, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(timer.id.into_inner())
        .bind(&timer.title)
        .bind(timer.kind.as_str())
        .bind(timer.duration_ms)
        .bind(timer.state.as_str())
        .bind(timer.started_at)
        .bind(timer.elapsed_ms)
        .bind(timer.show_seconds)
        .bind(timer.play_sound)
        .bind(&timer.color)
        .bind(&timer.overtime_color)
        .bind(&timer.message)
        .bind(timer.created_at)
        .bind(timer.updated_at)
        .execute(self.pool)
        .await?;

        tracing::debug!(timer_id = %timer.id, "Inserted timer");
        Ok(())
    }

    /// Fetch one timer.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::InvalidRow`] if the row cannot be decoded.
    pub async fn get(&self, id: TimerId) -> Result<Option<Timer>, DbError> {
        let row = sqlx::query_as::<_, TimerRow>(&format!(
            "SELECT {TIMER_COLUMNS} FROM timers t LEFT JOIN current_timer c ON c.timer_id = t.id WHERE t.id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(self.pool)
        .await?;

        row.map(TimerRow::into_timer).transpose()
    }

    /// All timers, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::InvalidRow`] if a row cannot be decoded.
    pub async fn list(&self) -> Result<Vec<Timer>, DbError> {
        let rows = sqlx::query_as::<_, TimerRow>(&format!(
            "SELECT {TIMER_COLUMNS} FROM timers t LEFT JOIN current_timer c ON c.timer_id = t.id ORDER BY t.created_at DESC, t.id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TimerRow::into_timer).collect()
    }

    /// Overwrite every mutable column. Returns `false` if the row is gone.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn update(&self, timer: &Timer) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"UPDATE timers
              SET title = $2, kind = $3::timer_kind, duration_ms = $4, state = $5::timer_state,
                  started_at = $6, elapsed_ms = $7, show_seconds = $8, play_sound = $9,
                  color = $10, overtime_color = $11, message = $12, updated_at = $13
              WHERE id = $1",
        )
        .bind(timer.id.into_inner())
        .bind(&timer.title)
        .bind(timer.kind.as_str())
        .bind(timer.duration_ms)
        .bind(timer.state.as_str())
        .bind(timer.started_at)
        .bind(timer.elapsed_ms)
        .bind(timer.show_seconds)
        .bind(timer.play_sound)
        .bind(&timer.color)
        .bind(&timer.overtime_color)
        .bind(&timer.message)
        .bind(timer.updated_at)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Hard-delete a timer. Actions cascade; the pointer is nulled.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn delete(&self, id: TimerId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM timers WHERE id = $1")
            .bind(id.into_inner())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The timer the pointer references, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn current_id(&self) -> Result<Option<TimerId>, DbError> {
        let id: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT timer_id FROM current_timer WHERE id = 1")
                .fetch_optional(self.pool)
                .await?;
        Ok(id.flatten().map(TimerId::from))
    }

    /// Point the singleton at `id` (or clear it).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails, including when
    /// `id` references a timer that no longer exists.
    pub async fn set_current(&self, id: Option<TimerId>) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO current_timer (id, timer_id, updated_at) VALUES (1, $1, now())
              ON CONFLICT (id) DO UPDATE SET timer_id = EXCLUDED.timer_id, updated_at = EXCLUDED.updated_at",
        )
        .bind(id.map(TimerId::into_inner))
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

/// A row from `timers` joined with the current pointer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TimerRow {
    /// Timer id.
    pub id: Uuid,
    /// Title.
    pub title: String,
    /// Kind as text (cast from the `PostgreSQL` enum).
    pub kind: String,
    /// Configured length.
    pub duration_ms: i64,
    /// State as text (cast from the `PostgreSQL` enum).
    pub state: String,
    /// Start of the live run.
    pub started_at: Option<DateTime<Utc>>,
    /// Accumulated time at last pause.
    pub elapsed_ms: i64,
    /// Render seconds.
    pub show_seconds: bool,
    /// Play a sound at zero.
    pub play_sound: bool,
    /// Normal color.
    pub color: String,
    /// Overtime color.
    pub overtime_color: String,
    /// Subtitle.
    pub message: Option<String>,
    /// Whether the pointer references this row.
    pub is_current: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last write.
    pub updated_at: DateTime<Utc>,
}

impl TimerRow {
    /// Decode into the shared [`Timer`] type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] if an enum column holds an unknown
    /// value.
    pub fn into_timer(self) -> Result<Timer, DbError> {
        let kind = TimerKind::parse(&self.kind)
            .ok_or_else(|| DbError::InvalidRow(format!("timers.kind = {:?}", self.kind)))?;
        let state = TimerState::parse(&self.state)
            .ok_or_else(|| DbError::InvalidRow(format!("timers.state = {:?}", self.state)))?;
        Ok(Timer {
            id: TimerId::from(self.id),
            title: self.title,
            kind,
            duration_ms: self.duration_ms,
            state,
            started_at: self.started_at,
            elapsed_ms: self.elapsed_ms,
            show_seconds: self.show_seconds,
            play_sound: self.play_sound,
            color: self.color,
            overtime_color: self.overtime_color,
            message: self.message,
            is_current: self.is_current,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
