//! HTTP client for the API server.
//!
//! [`ApiClient`] polls `/timer` and reads `/time`. It also implements
//! [`TimeSource`], so the same connection pool feeds the clock sync task.
//! Every request carries the configured timeout.

use std::time::Duration;

use eventops_core::clock_sync::{SyncError, TimeSource};
use eventops_types::{Timer, TimerMessage};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::DisplayError;

/// Body of `GET /timer?action=current`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTimer {
    /// The current timer, if any. Derived fields the server adds are
    /// ignored; the display derives its own reading from the adjusted clock.
    pub timer: Option<Timer>,
    /// Server clock when the response was built.
    pub server_time: i64,
}

/// Body of `GET /timer?action=messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct Messages {
    /// Live messages, newest first.
    pub messages: Vec<TimerMessage>,
}

/// Body of `GET /time`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerTime {
    /// Server clock in Unix milliseconds.
    pub now: i64,
    /// Zone the event runs in.
    pub timezone: String,
}

/// Client for the API server.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
}

impl ApiClient {
    /// Create a client for `base_url` whose requests time out after
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`DisplayError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DisplayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DisplayError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// The server this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Poll the current timer.
    pub async fn current_timer(&self) -> Result<CurrentTimer, DisplayError> {
        self.get_json("/timer?action=current").await
    }

    /// Poll live messages.
    pub async fn messages(&self) -> Result<Vec<TimerMessage>, DisplayError> {
        let body: Messages = self.get_json("/timer?action=messages").await?;
        Ok(body.messages)
    }

    /// Read the server clock.
    pub async fn server_time(&self) -> Result<ServerTime, DisplayError> {
        self.get_json("/time").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DisplayError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(DisplayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| DisplayError::Decode(format!("{path}: {e}")))
    }

    fn request_error(&self, err: &reqwest::Error) -> DisplayError {
        if err.is_timeout() {
            DisplayError::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else {
            DisplayError::Http(err.to_string())
        }
    }
}

impl TimeSource for ApiClient {
    async fn server_time_ms(&self) -> Result<i64, SyncError> {
        Ok(self.server_time().await?.now)
    }
}
