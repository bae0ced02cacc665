//! Error types for the display client.
//!
//! Uses `thiserror` for typed errors that surface through polling and
//! clock synchronization. None of them stop the display: the poller logs
//! and keeps the last good data, the sync task keeps the last offset.

use eventops_core::clock_sync::SyncError;

/// Errors that can occur while talking to the API server.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// The request could not be sent or the connection failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// No response arrived within the request timeout.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// The configured timeout.
        timeout_ms: u64,
    },

    /// The server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for the log.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl From<DisplayError> for SyncError {
    fn from(err: DisplayError) -> Self {
        match err {
            DisplayError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            DisplayError::Status { .. } | DisplayError::Decode(_) => {
                Self::InvalidResponse(err.to_string())
            }
            DisplayError::Http(msg) | DisplayError::Config(msg) => Self::Transport(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_stay_timeouts() {
        let err: SyncError = DisplayError::Timeout { timeout_ms: 5_000 }.into();
        assert!(matches!(err, SyncError::Timeout { timeout_ms: 5_000 }));
    }

    #[test]
    fn bad_bodies_are_invalid_responses() {
        let err: SyncError = DisplayError::Status {
            status: 502,
            body: "bad gateway".to_owned(),
        }
        .into();
        assert!(matches!(err, SyncError::InvalidResponse(_)));

        let err: SyncError = DisplayError::Http("refused".to_owned()).into();
        assert!(matches!(err, SyncError::Transport(_)));
    }
}
