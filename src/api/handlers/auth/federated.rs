//! Local side of a federated sign-in.
//!
//! Once the identity provider has vouched for an email, the user row is
//! upserted and a session is issued. A store failure rejects the sign-in.

use axum::http::HeaderMap;
use sqlx::PgPool;
use tracing::info;

use super::{
    session::session_headers,
    state::AuthState,
    storage::{FederatedProfile, UserRecord, upsert_federated_user},
};
use crate::api::{
    error::ApiError,
    handlers::{non_blank, normalize_email, valid_email},
};

/// Normalize what the provider returned. `None` when the email is unusable.
pub(super) fn normalize_profile(
    email: &str,
    name: Option<&str>,
    picture: Option<&str>,
) -> Option<FederatedProfile> {
    let email = normalize_email(email);
    if !valid_email(&email) {
        return None;
    }
    Some(FederatedProfile {
        email,
        name: non_blank(name).map(str::to_string),
        picture: non_blank(picture).map(str::to_string),
    })
}

/// Upsert the user for `profile` and issue a session for it.
pub(super) async fn sign_in_federated(
    pool: &PgPool,
    auth_state: &AuthState,
    profile: &FederatedProfile,
) -> Result<(UserRecord, HeaderMap), ApiError> {
    let user = upsert_federated_user(pool, profile).await?;
    let (_token, headers) = session_headers(auth_state, &user.id)?;
    info!(user_id = %user.id, "Federated sign-in");
    Ok((user, headers))
}
