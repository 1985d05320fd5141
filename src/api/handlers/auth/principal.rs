//! Authenticated principal extraction.
//!
//! Verifying the session token needs no store access, so unauthenticated
//! requests are turned away before any query runs.

use axum::http::HeaderMap;

use super::{session::authenticate_session, state::AuthState};
use crate::api::error::ApiError;

/// Authenticated user context derived from the session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
}

/// Resolve the session token into a principal, or `401` when there is none.
pub fn require_auth(headers: &HeaderMap, auth_state: &AuthState) -> Result<Principal, ApiError> {
    authenticate_session(headers, auth_state)
        .map(|claims| Principal {
            user_id: claims.sub,
        })
        .ok_or(ApiError::Unauthenticated)
}
