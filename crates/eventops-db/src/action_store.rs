//! Timer action rows.
//!
//! [`ActionTable::mark_executed`] is a conditional update
//! (`WHERE executed = FALSE`), which is what lets several scheduler
//! instances race on the same action with exactly one winner.

use chrono::{DateTime, Utc};
use eventops_types::{ActionId, TimerAction, TimerActionKind, TimerId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `timer_actions` table.
pub struct ActionTable<'a> {
    pool: &'a PgPool,
}

impl<'a> ActionTable<'a> {
    /// Create a table handle bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new action.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, action: &TimerAction) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO timer_actions (id, timer_id, trigger_ms, kind, message, color, flash, enabled, executed, created_at)
              VALUES ($1, $2, $3, $4::timer_action_kind, $5, $6, $7, $8, $9, $10)",
        )
        .bind(action.id.into_inner())
        .bind(action.timer_id.into_inner())
        .bind(action.trigger_ms)
        .bind(action.kind.as_str())
        .bind(&action.message)
        .bind(&action.color)
        .bind(action.flash)
        .bind(action.enabled)
        .bind(action.executed)
        .bind(action.created_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch one action.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::InvalidRow`] if the row cannot be decoded.
    pub async fn get(&self, id: ActionId) -> Result<Option<TimerAction>, DbError> {
        let row = sqlx::query_as::<_, ActionRow>(
            r"SELECT id, timer_id, trigger_ms, kind::TEXT AS kind, message, color, flash, enabled, executed, created_at
              FROM timer_actions WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool)
        .await?;
        row.map(ActionRow::into_action).transpose()
    }

    /// Actions of one timer (or all when `None`), largest trigger first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::InvalidRow`] if a row cannot be decoded.
    pub async fn list(&self, timer_id: Option<TimerId>) -> Result<Vec<TimerAction>, DbError> {
        let rows = sqlx::query_as::<_, ActionRow>(
            r"SELECT id, timer_id, trigger_ms, kind::TEXT AS kind, message, color, flash, enabled, executed, created_at
              FROM timer_actions
              WHERE $1::UUID IS NULL OR timer_id = $1
              ORDER BY trigger_ms DESC, id",
        )
        .bind(timer_id.map(TimerId::into_inner))
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(ActionRow::into_action).collect()
    }

    /// Overwrite every mutable column. Returns `false` if the row is gone.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn update(&self, action: &TimerAction) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"UPDATE timer_actions
              SET trigger_ms = $2, kind = $3::timer_action_kind, message = $4, color = $5,
                  flash = $6, enabled = $7, executed = $8
              WHERE id = $1",
        )
        .bind(action.id.into_inner())
        .bind(action.trigger_ms)
        .bind(action.kind.as_str())
        .bind(&action.message)
        .bind(&action.color)
        .bind(action.flash)
        .bind(action.enabled)
        .bind(action.executed)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an action. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn delete(&self, id: ActionId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM timer_actions WHERE id = $1")
            .bind(id.into_inner())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear `executed` on every action of a timer.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn reset(&self, timer_id: TimerId) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE timer_actions SET executed = FALSE WHERE timer_id = $1 AND executed",
        )
        .bind(timer_id.into_inner())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Set `executed` if it is clear. Returns whether this call set it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn mark_executed(&self, id: ActionId) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE timer_actions SET executed = TRUE WHERE id = $1 AND NOT executed",
        )
        .bind(id.into_inner())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// A row from the `timer_actions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActionRow {
    /// Action id.
    pub id: Uuid,
    /// Owning timer.
    pub timer_id: Uuid,
    /// Remaining-time threshold.
    pub trigger_ms: i64,
    /// Kind as text (cast from the `PostgreSQL` enum).
    pub kind: String,
    /// Message to post.
    pub message: Option<String>,
    /// Color to apply.
    pub color: Option<String>,
    /// Flash flag.
    pub flash: bool,
    /// Armed flag.
    pub enabled: bool,
    /// Fired flag.
    pub executed: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ActionRow {
    /// Decode into the shared [`TimerAction`] type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] if `kind` holds an unknown value.
    pub fn into_action(self) -> Result<TimerAction, DbError> {
        let kind = TimerActionKind::parse(&self.kind)
            .ok_or_else(|| DbError::InvalidRow(format!("timer_actions.kind = {:?}", self.kind)))?;
        Ok(TimerAction {
            id: ActionId::from(self.id),
            timer_id: TimerId::from(self.timer_id),
            trigger_ms: self.trigger_ms,
            kind,
            message: self.message,
            color: self.color,
            flash: self.flash,
            enabled: self.enabled,
            executed: self.executed,
            created_at: self.created_at,
        })
    }
}
