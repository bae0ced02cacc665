//! `Dragonfly` (Redis-compatible) status and visitor counter.
//!
//! An alternative home for the status and visitor counters when many staff
//! devices hit the counter at once. Each day's count lives in a plain
//! integer key so increments map to `INCRBY`, which the server executes
//! atomically.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `event:status` | JSON | Serialized [`EventStatus`] |
//! | `event:visitors:{date}` | Integer | Visitor count for one event day |
//! | `event:visitors:{date}:updated_at` | Integer | Last counter write, epoch ms |

use chrono::{DateTime, NaiveDate, Utc};
use eventops_types::{EventStatus, VisitorCounter};
use fred::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::DbError;

/// Key holding the serialized status.
pub const STATUS_KEY: &str = "event:status";

/// Key prefix for the per-day visitor counts.
pub const VISITORS_PREFIX: &str = "event:visitors";

/// Key holding the visitor count for `date`.
pub fn visitors_key(date: NaiveDate) -> String {
    format!("{VISITORS_PREFIX}:{date}")
}

/// Key holding the last counter write time for `date`.
pub fn visitors_updated_key(date: NaiveDate) -> String {
    format!("{VISITORS_PREFIX}:{date}:updated_at")
}

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Wraps a [`fred::prelude::Client`]; cloning shares the connection.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl std::fmt::Debug for DragonflyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragonflyPool").finish_non_exhaustive()
    }
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    // =========================================================================
    // Generic JSON get/set
    // =========================================================================

    /// Serialize `value` as JSON and store it at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if serialization fails.
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let _: () = self.client.set(key, json.as_str(), None, None, false).await?;
        Ok(())
    }

    /// Store `value` at `key` only if the key does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or the write fails.
    pub async fn set_json_nx<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let _: Option<String> = self
            .client
            .set(key, json.as_str(), None, Some(SetOptions::NX), false)
            .await?;
        Ok(())
    }

    /// Read the value at `key` and deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if deserialization fails.
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        Ok(value.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    // =========================================================================
    // Event status -- event:status
    // =========================================================================

    /// The status, writing `default_label` first if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a command or deserialization fails.
    pub async fn get_or_init_status(
        &self,
        default_label: &str,
        now: DateTime<Utc>,
    ) -> Result<EventStatus, DbError> {
        if let Some(status) = self.get_json::<EventStatus>(STATUS_KEY).await? {
            return Ok(status);
        }
        let initial = EventStatus {
            label: default_label.to_owned(),
            updated_at: now,
        };
        self.set_json_nx(STATUS_KEY, &initial).await?;
        Ok(self.get_json(STATUS_KEY).await?.unwrap_or(initial))
    }

    /// Overwrite the status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or the write fails.
    pub async fn set_status(&self, label: &str, now: DateTime<Utc>) -> Result<EventStatus, DbError> {
        let status = EventStatus {
            label: label.to_owned(),
            updated_at: now,
        };
        self.set_json(STATUS_KEY, &status).await?;
        Ok(status)
    }

    // =========================================================================
    // Visitor counters -- event:visitors:{date}
    // =========================================================================

    /// The counter for `date`; an absent key reads as zero.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn get_visitors(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<VisitorCounter, DbError> {
        Ok(self.read_visitors(date).await?.unwrap_or(VisitorCounter {
            event_date: date,
            count: 0,
            updated_at: now,
        }))
    }

    /// Set the counter for `date` to an absolute value.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn set_visitors(
        &self,
        date: NaiveDate,
        count: i64,
        now: DateTime<Utc>,
    ) -> Result<VisitorCounter, DbError> {
        let _: () = self
            .client
            .set(visitors_key(date), count, None, None, false)
            .await?;
        self.touch_visitors(date, now).await?;
        Ok(VisitorCounter {
            event_date: date,
            count,
            updated_at: now,
        })
    }

    /// Add `delta` to the counter for `date` with `INCRBY` and return the
    /// resulting count.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the command fails.
    pub async fn increment_visitors(
        &self,
        date: NaiveDate,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<VisitorCounter, DbError> {
        let count: i64 = self.client.incr_by(visitors_key(date), delta).await?;
        self.touch_visitors(date, now).await?;
        Ok(VisitorCounter {
            event_date: date,
            count,
            updated_at: now,
        })
    }

    /// Counters for `from..=to` that exist, newest day first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if a read fails.
    pub async fn visitor_history(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<VisitorCounter>, DbError> {
        let mut history = Vec::new();
        for date in from.iter_days().take_while(|d| *d <= to) {
            if let Some(counter) = self.read_visitors(date).await? {
                history.push(counter);
            }
        }
        history.reverse();
        Ok(history)
    }

    /// Round-trip a read.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the server is unreachable.
    pub async fn ping(&self) -> Result<(), DbError> {
        let _: Option<String> = self.client.get(STATUS_KEY).await?;
        Ok(())
    }

    async fn read_visitors(&self, date: NaiveDate) -> Result<Option<VisitorCounter>, DbError> {
        let count: Option<i64> = self.client.get(visitors_key(date)).await?;
        let Some(count) = count else {
            return Ok(None);
        };
        let updated: Option<i64> = self.client.get(visitors_updated_key(date)).await?;
        Ok(Some(VisitorCounter {
            event_date: date,
            count,
            updated_at: updated
                .and_then(DateTime::from_timestamp_millis)
                .unwrap_or_default(),
        }))
    }

    async fn touch_visitors(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<(), DbError> {
        let _: () = self
            .client
            .set(
                visitors_updated_key(date),
                now.timestamp_millis(),
                None,
                None,
                false,
            )
            .await?;
        Ok(())
    }
}
