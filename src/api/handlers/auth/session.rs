//! Session endpoints for cookie and bearer auth.

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error};

use super::{
    state::{AuthConfig, AuthState, unix_now},
    storage::find_user_by_id,
    token::{SessionClaims, TokenError},
    types::SessionResponse,
};
use crate::api::error::ApiError;

pub(crate) const SESSION_COOKIE_NAME: &str = "potemkin_session";

#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    // Missing or invalid tokens are treated as "no session".
    let Some(claims) = authenticate_session(&headers, &auth_state) else {
        return StatusCode::NO_CONTENT.into_response();
    };

    match find_user_by_id(&pool, &claims.sub).await {
        Ok(Some(user)) => {
            let response = SessionResponse {
                user_id: user.id,
                email: user.email,
                name: user.name,
                picture: user.picture,
                token: None,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => ApiError::Store(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Session cookie cleared")
    ),
    tag = "auth"
)]
pub async fn logout(auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    // Tokens are stateless; clearing the cookie is all there is to do.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers)
}

/// Verify the session token from the request, if present.
///
/// Returns `None` when the token is missing, malformed, forged, or expired.
pub(crate) fn authenticate_session(
    headers: &HeaderMap,
    auth_state: &AuthState,
) -> Option<SessionClaims> {
    let token = extract_session_token(headers)?;
    match auth_state.session_key().verify(&token, unix_now()) {
        Ok(claims) => Some(claims),
        Err(err) => {
            debug!("Rejected session token: {err}");
            None
        }
    }
}

/// Sign a fresh session token for `user_id`.
pub(super) fn issue_session_token(
    auth_state: &AuthState,
    user_id: &str,
) -> Result<String, TokenError> {
    let claims = SessionClaims::new(
        user_id,
        unix_now(),
        auth_state.config().session_ttl_seconds(),
    );
    auth_state.session_key().sign(&claims)
}

/// Issue a token for `user_id` and wrap it in a `Set-Cookie` header.
pub(super) fn session_headers(
    auth_state: &AuthState,
    user_id: &str,
) -> Result<(String, HeaderMap), ApiError> {
    let token = issue_session_token(auth_state, user_id).map_err(|err| {
        error!("Failed to sign session token: {err}");
        ApiError::Internal("session signing failed".to_string())
    })?;
    let cookie = session_cookie(auth_state.config(), &token).map_err(|err| {
        error!("Failed to build session cookie: {err}");
        ApiError::Internal("session cookie failed".to_string())
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((token, headers))
}

/// Build a `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    // Only mark cookies secure when the frontend is served over HTTPS.
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    cookie_value(headers, SESSION_COOKIE_NAME)
}

/// Read a cookie by name from the `Cookie` header.
pub(super) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        (key.trim() == name).then(|| val.trim().to_string())
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
