//! Google OAuth2 sign-in (authorization-code flow).
//!
//! Flow Overview:
//! 1. `GET /auth/google` stores a random `state` in a short-lived cookie and
//!    redirects to Google.
//! 2. Google redirects back to `GET /auth/google/callback` with `code` and
//!    `state`. The state must match the cookie.
//! 3. The code is exchanged for an access token, the userinfo document is
//!    fetched, and a verified email is required.
//! 4. The local user is upserted and the browser is sent to the dashboard
//!    with a session cookie.
//!
//! Both routes answer `404` when federated sign-in is disabled.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{
        HeaderMap, HeaderValue,
        header::{InvalidHeaderValue, SET_COOKIE},
    },
    response::{IntoResponse, Redirect, Response},
};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{Instrument, debug, info_span};
use url::Url;

use super::{
    federated::{normalize_profile, sign_in_federated},
    session::cookie_value,
    state::AuthState,
    types::{OAuthCallbackQuery, ProviderResponse},
};
use crate::{
    api::error::{ApiError, ErrorResponse},
    password::constant_time_eq,
};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

pub(crate) const STATE_COOKIE_NAME: &str = "potemkin_oauth_state";
const STATE_COOKIE_PATH: &str = "/auth/google";
const STATE_TTL_SECONDS: u32 = 600;
const STATE_BYTES: usize = 32;

/// OAuth client registration for Google.
#[derive(Clone, Debug)]
pub struct GoogleConfig {
    client_id: String,
    client_secret: SecretString,
    redirect_url: String,
}

impl GoogleConfig {
    /// `redirect_url` must be the absolute URL of `/auth/google/callback` as
    /// registered with Google.
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString, redirect_url: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_url,
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug)]
pub(crate) struct GoogleProvider {
    config: GoogleConfig,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub(crate) fn new(config: GoogleConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Google's consent URL for this client and `state`.
    pub(crate) fn authorize_url(&self, state: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
            ],
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ApiError> {
        let span = info_span!("oauth.token", http.url = TOKEN_URL);
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .instrument(span)
            .await
            .map_err(|err| ApiError::Provider(format!("token request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Provider(format!("token endpoint returned {status}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| ApiError::Provider(format!("invalid token response: {err}")))?;
        Ok(token.access_token)
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, ApiError> {
        let span = info_span!("oauth.userinfo", http.url = USERINFO_URL);
        let response = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .instrument(span)
            .await
            .map_err(|err| ApiError::Provider(format!("userinfo request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Provider(format!("userinfo endpoint returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|err| ApiError::Provider(format!("invalid userinfo response: {err}")))
    }
}

#[utoipa::path(
    get,
    path = "/auth/providers",
    responses(
        (
            status = 200,
            description = "Sign-in methods offered by this deployment",
            body = [ProviderResponse]
        )
    ),
    tag = "auth"
)]
pub async fn providers(auth_state: Extension<Arc<AuthState>>) -> Json<Vec<ProviderResponse>> {
    Json(provider_list(&auth_state))
}

fn provider_list(auth_state: &AuthState) -> Vec<ProviderResponse> {
    let mut providers = vec![ProviderResponse {
        id: "credentials".to_string(),
        name: "Email and password".to_string(),
        signin_url: "/auth/login".to_string(),
    }];
    if auth_state.google().is_some() {
        providers.push(ProviderResponse {
            id: "google".to_string(),
            name: "Google".to_string(),
            signin_url: "/auth/google".to_string(),
        });
    }
    providers
}

#[utoipa::path(
    get,
    path = "/auth/google",
    responses(
        (status = 303, description = "Redirect to Google's consent screen"),
        (status = 404, description = "Federated sign-in is disabled", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn google_start(auth_state: Extension<Arc<AuthState>>) -> Response {
    match start_inner(&auth_state) {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

fn start_inner(auth_state: &AuthState) -> Result<Response, ApiError> {
    let google = auth_state.google().ok_or(ApiError::NotFound)?;
    let state = generate_state();
    let location = google
        .authorize_url(&state)
        .map_err(|err| ApiError::Internal(format!("authorize url: {err}")))?;
    let secure = auth_state.config().session_cookie_secure();
    let cookie = state_cookie(&state, STATE_TTL_SECONDS, secure)
        .map_err(|err| ApiError::Internal(format!("state cookie: {err}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((headers, Redirect::to(location.as_str())).into_response())
}

#[utoipa::path(
    get,
    path = "/auth/google/callback",
    params(OAuthCallbackQuery),
    responses(
        (status = 303, description = "Signed in; redirect to the dashboard"),
        (status = 400, description = "Missing code or state mismatch", body = ErrorResponse),
        (status = 401, description = "Google account has no verified email", body = ErrorResponse),
        (status = 404, description = "Federated sign-in is disabled", body = ErrorResponse),
        (status = 502, description = "Google request failed", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn google_callback(
    headers: HeaderMap,
    query: Query<OAuthCallbackQuery>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    match callback_inner(&headers, &query, &pool, &auth_state).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn callback_inner(
    headers: &HeaderMap,
    query: &OAuthCallbackQuery,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<Response, ApiError> {
    let google = auth_state.google().ok_or(ApiError::NotFound)?;
    let code = check_callback(headers, query)?;

    let access_token = google.exchange_code(code).await?;
    let info = google.fetch_user_info(&access_token).await?;
    if !info.email_verified {
        debug!("Google account without a verified email");
        return Err(ApiError::InvalidCredentials);
    }
    let profile = info
        .email
        .as_deref()
        .and_then(|email| normalize_profile(email, info.name.as_deref(), info.picture.as_deref()))
        .ok_or_else(|| ApiError::Provider("userinfo without a usable email".to_string()))?;

    let (_user, mut response_headers) = sign_in_federated(pool, auth_state, &profile).await?;
    if let Ok(clear) = state_cookie("", 0, auth_state.config().session_cookie_secure()) {
        response_headers.append(SET_COOKIE, clear);
    }
    let dashboard = format!("{}/dashboard", auth_state.config().frontend_base_url());
    Ok((response_headers, Redirect::to(&dashboard)).into_response())
}

/// Validate the callback query against the state cookie and return the code.
fn check_callback<'a>(
    headers: &HeaderMap,
    query: &'a OAuthCallbackQuery,
) -> Result<&'a str, ApiError> {
    if let Some(error) = query.error.as_deref() {
        debug!("Google returned an authorization error: {error}");
        return Err(ApiError::validation("Sign-in was not authorized"));
    }
    let (Some(code), Some(state)) = (query.code.as_deref(), query.state.as_deref()) else {
        return Err(ApiError::validation("Missing authorization code"));
    };
    let expected = cookie_value(headers, STATE_COOKIE_NAME).unwrap_or_default();
    if expected.is_empty() || !constant_time_eq(expected.as_bytes(), state.as_bytes()) {
        return Err(ApiError::validation("Invalid OAuth state"));
    }
    Ok(code)
}

fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn state_cookie(
    state: &str,
    max_age: u32,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{STATE_COOKIE_NAME}={state}; Path={STATE_COOKIE_PATH}; HttpOnly; SameSite=Lax; \
         Max-Age={max_age}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
