//! Email/password sign-in.
//!
//! Flow Overview: normalize the email, look the user up, require a stored
//! hash and salt, verify the password, then issue a session. Every rejection,
//! including a failed lookup, is reported as "Invalid credentials" so callers
//! cannot tell an unknown email from a wrong password or an outage.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::{future::Future, sync::Arc};
use tracing::{debug, warn};

use super::{
    session::session_headers,
    state::AuthState,
    storage::{UserRecord, find_user_by_email},
    types::{LoginRequest, SessionResponse},
};
use crate::{
    api::{
        error::{ApiError, ErrorResponse},
        handlers::{json_payload, normalize_email, non_blank},
    },
    password::verify_password_with_iterations,
};

/// Read access to user rows by email.
pub(crate) trait UserLookup: Send + Sync {
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;
}

impl UserLookup for PgPool {
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send {
        find_user_by_email(self, email)
    }
}

/// The user a credential check resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Identity {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) name: Option<String>,
    pub(crate) picture: Option<String>,
}

impl From<UserRecord> for Identity {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            picture: user.picture,
        }
    }
}

/// Check an email/password pair. `None` means "reject" whatever the reason.
///
/// The hash is verified with the iteration count stored alongside it, so
/// raising `--kdf-iterations` only affects hashes created afterwards.
pub(crate) async fn authenticate<L: UserLookup>(
    lookup: &L,
    email: &str,
    password: &str,
) -> Option<Identity> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return None;
    }

    let user = match lookup.find_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!("Credential sign-in for unknown email");
            return None;
        }
        Err(err) => {
            warn!("Credential lookup failed, rejecting sign-in: {err}");
            return None;
        }
    };

    let (Some(stored_hash), Some(salt)) = (user.password_hash.clone(), user.salt.clone()) else {
        debug!("Credential sign-in for user without a password");
        return None;
    };
    let Some(iterations) = user.stored_iterations() else {
        warn!(user_id = %user.id, "Stored KDF iteration count is invalid, rejecting sign-in");
        return None;
    };

    // PBKDF2 runs off the async runtime.
    let candidate = password.to_string();
    let verified = tokio::task::spawn_blocking(move || {
        verify_password_with_iterations(&candidate, &stored_hash, &salt, iterations)
    })
    .await;
    match verified {
        Ok(true) => Some(Identity::from(user)),
        Ok(false) => {
            debug!("Credential sign-in with wrong password");
            None
        }
        Err(err) => {
            warn!("Password verification task failed, rejecting sign-in: {err}");
            None
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = SessionResponse),
        (status = 400, description = "Malformed JSON body", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    match login_inner(&*pool, &auth_state, payload).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn login_inner<L: UserLookup>(
    lookup: &L,
    auth_state: &AuthState,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_payload(payload)?;
    let (Some(email), Some(password)) = (
        non_blank(request.email.as_deref()),
        request.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::InvalidCredentials);
    };

    let identity = authenticate(lookup, email, password)
        .await
        .ok_or(ApiError::InvalidCredentials)?;

    let (token, headers) = session_headers(auth_state, &identity.id)?;
    let body = SessionResponse {
        user_id: identity.id,
        email: identity.email,
        name: identity.name,
        picture: identity.picture,
        token: Some(token),
    };
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}
