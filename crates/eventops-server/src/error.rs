//! Error types for the API server.
//!
//! [`ApiError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.
//! Every error body has the shape `{error, kind, status}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use eventops_core::error::EngineError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested timer, message, or action does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A required field is missing or a value is out of range.
    #[error("{0}")]
    InvalidInput(String),

    /// No session, or the bearer token is unknown.
    #[error("{0}")]
    Unauthorized(String),

    /// The session's role may not perform this operation.
    #[error("{0}")]
    Forbidden(String),

    /// A store call failed. Not retried here.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A health check failed.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// A serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::StoreUnavailable(_) | Self::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable error kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::InvalidInput(_) => "InvalidInput",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::StoreUnavailable(_) | Self::Unavailable(_) => "StoreUnavailable",
            Self::Serialization(_) => "Internal",
        }
    }

    /// Shorthand for a missing request field.
    pub fn missing(field: &str) -> Self {
        Self::InvalidInput(format!("missing required field: {field}"))
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound { .. } => Self::NotFound(err.to_string()),
            EngineError::InvalidInput(msg) => Self::InvalidInput(msg),
            EngineError::Store { source } => Self::StoreUnavailable(source.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, kind = self.kind(), "Request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
