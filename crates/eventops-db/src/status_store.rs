//! Event status singleton and per-day visitor counters in `PostgreSQL`.
//!
//! `event_status` holds at most one row (`id = 1`); `visitor_counter` holds
//! one row per `event_date`. Reads get-or-create the row with an upsert
//! whose conflict arm rewrites the existing value, so `RETURNING` yields a
//! row even when a concurrent first read won the insert. The increment is a
//! single upsert that adds to the stored value, so concurrent increments
//! never lose updates.

use chrono::{DateTime, NaiveDate, Utc};
use eventops_types::{EventStatus, VisitorCounter};
use sqlx::PgPool;

use crate::error::DbError;

/// Operations on the `event_status` and `visitor_counter` tables.
pub struct StatusTable<'a> {
    pool: &'a PgPool,
}

impl<'a> StatusTable<'a> {
    /// Create a table handle bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The status row, inserting `default_label` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the statement fails.
    pub async fn get_or_init_status(
        &self,
        default_label: &str,
        now: DateTime<Utc>,
    ) -> Result<EventStatus, DbError> {
        let row = sqlx::query_as::<_, StatusRow>(
            r"INSERT INTO event_status (id, label, updated_at) VALUES (1, $1, $2)
              ON CONFLICT (id) DO UPDATE SET label = event_status.label
              RETURNING label, updated_at",
        )
        .bind(default_label)
        .bind(now)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// Upsert the status label.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails.
    pub async fn upsert_status(
        &self,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<EventStatus, DbError> {
        let row = sqlx::query_as::<_, StatusRow>(
            r"INSERT INTO event_status (id, label, updated_at) VALUES (1, $1, $2)
              ON CONFLICT (id) DO UPDATE SET label = EXCLUDED.label, updated_at = EXCLUDED.updated_at
              RETURNING label, updated_at",
        )
        .bind(label)
        .bind(now)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// The counter for `date`, inserting zero if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the statement fails.
    pub async fn get_or_init_visitors(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<VisitorCounter, DbError> {
        let row = sqlx::query_as::<_, CounterRow>(
            r"INSERT INTO visitor_counter (event_date, count, updated_at) VALUES ($1, 0, $2)
              ON CONFLICT (event_date) DO UPDATE SET count = visitor_counter.count
              RETURNING event_date, count, updated_at",
        )
        .bind(date)
        .bind(now)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// Upsert the counter for `date` to an absolute value.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails.
    pub async fn upsert_visitors(
        &self,
        date: NaiveDate,
        count: i64,
        now: DateTime<Utc>,
    ) -> Result<VisitorCounter, DbError> {
        let row = sqlx::query_as::<_, CounterRow>(
            r"INSERT INTO visitor_counter (event_date, count, updated_at) VALUES ($1, $2, $3)
              ON CONFLICT (event_date) DO UPDATE
                  SET count = EXCLUDED.count, updated_at = EXCLUDED.updated_at
              RETURNING event_date, count, updated_at",
        )
        .bind(date)
        .bind(count)
        .bind(now)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// Add `delta` to the counter for `date` in one atomic statement.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails (including
    /// `BIGINT` overflow).
    pub async fn increment_visitors(
        &self,
        date: NaiveDate,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<VisitorCounter, DbError> {
        let row = sqlx::query_as::<_, CounterRow>(
            r"INSERT INTO visitor_counter (event_date, count, updated_at) VALUES ($1, $2, $3)
              ON CONFLICT (event_date) DO UPDATE
                  SET count = visitor_counter.count + EXCLUDED.count, updated_at = EXCLUDED.updated_at
              RETURNING event_date, count, updated_at",
        )
        .bind(date)
        .bind(delta)
        .bind(now)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// Counters for `from..=to`, newest day first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn history(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<VisitorCounter>, DbError> {
        let rows = sqlx::query_as::<_, CounterRow>(
            r"SELECT event_date, count, updated_at FROM visitor_counter
              WHERE event_date BETWEEN $1 AND $2
              ORDER BY event_date DESC",
        )
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(VisitorCounter::from).collect())
    }
}

/// A row from `event_status`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusRow {
    /// Status label.
    pub label: String,
    /// Last write.
    pub updated_at: DateTime<Utc>,
}

impl From<StatusRow> for EventStatus {
    fn from(row: StatusRow) -> Self {
        Self {
            label: row.label,
            updated_at: row.updated_at,
        }
    }
}

/// A row from `visitor_counter`.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct CounterRow {
    /// Event day.
    pub event_date: NaiveDate,
    /// Count for that day.
    pub count: i64,
    /// Last write.
    pub updated_at: DateTime<Utc>,
}

impl From<CounterRow> for VisitorCounter {
    fn from(row: CounterRow) -> Self {
        Self {
            event_date: row.event_date,
            count: row.count,
            updated_at: row.updated_at,
        }
    }
}
