//! Bearer-token sessions for mutating endpoints.
//!
//! The token table in configuration stands in for the external identity
//! service: each token maps to a [`SessionRole`]. When the table is empty
//! the gate is disabled and every request acts as an admin.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use eventops_types::SessionRole;

use crate::error::ApiError;
use crate::state::AppState;

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Role granted by the bearer token.
    pub role: SessionRole,
}

impl Session {
    /// Succeeds when the session's role is at least `role`.
    pub fn require(self, role: SessionRole) -> Result<Self, ApiError> {
        if self.role >= role {
            Ok(self)
        } else {
            Err(ApiError::Forbidden(format!(
                "{} role required",
                role.as_str()
            )))
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if !state.auth.enabled() {
            return Ok(Self {
                role: SessionRole::Admin,
            });
        }
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_owned()))?;
        let role = state
            .auth
            .role_for(token)
            .ok_or_else(|| ApiError::Unauthorized("unknown session".to_owned()))?;
        Ok(Self { role })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::get("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }

    #[test]
    fn staff_cannot_act_as_admin() {
        let staff = Session {
            role: SessionRole::Staff,
        };
        assert!(staff.require(SessionRole::Staff).is_ok());
        assert!(matches!(
            staff.require(SessionRole::Admin),
            Err(ApiError::Forbidden(_))
        ));

        let admin = Session {
            role: SessionRole::Admin,
        };
        assert!(admin.require(SessionRole::Staff).is_ok());
    }
}
