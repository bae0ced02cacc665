//! Broadcast message rows.

use chrono::{DateTime, Utc};
use eventops_types::{MessageId, TimerId, TimerMessage};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `timer_messages` table.
pub struct MessageTable<'a> {
    pool: &'a PgPool,
}

impl<'a> MessageTable<'a> {
    /// Create a table handle bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new message.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, message: &TimerMessage) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO timer_messages (id, text, color, flash, timer_id, created_at, expires_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(message.id.into_inner())
        .bind(&message.text)
        .bind(&message.color)
        .bind(message.flash)
        .bind(message.timer_id.map(TimerId::into_inner))
        .bind(message.created_at)
        .bind(message.expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch one message regardless of expiry.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get(&self, id: MessageId) -> Result<Option<TimerMessage>, DbError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r"SELECT id, text, color, flash, timer_id, created_at, expires_at
              FROM timer_messages WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(MessageRow::into_message))
    }

    /// Messages not yet expired at `now`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list_live(&self, now: DateTime<Utc>) -> Result<Vec<TimerMessage>, DbError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r"SELECT id, text, color, flash, timer_id, created_at, expires_at
              FROM timer_messages
              WHERE expires_at IS NULL OR expires_at > $1
              ORDER BY created_at DESC, id DESC",
        )
        .bind(now)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    /// Delete a message. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn delete(&self, id: MessageId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM timer_messages WHERE id = $1")
            .bind(id.into_inner())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete messages that expired at or before `before`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM timer_messages WHERE expires_at <= $1")
            .bind(before)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// A row from the `timer_messages` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    /// Message id.
    pub id: Uuid,
    /// Body.
    pub text: String,
    /// Text color.
    pub color: Option<String>,
    /// Flash flag.
    pub flash: bool,
    /// Attached timer.
    pub timer_id: Option<Uuid>,
    /// Send time.
    pub created_at: DateTime<Utc>,
    /// Expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl MessageRow {
    /// Convert into the shared [`TimerMessage`] type.
    pub fn into_message(self) -> TimerMessage {
        TimerMessage {
            id: MessageId::from(self.id),
            text: self.text,
            color: self.color,
            flash: self.flash,
            timer_id: self.timer_id.map(TimerId::from),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}
