use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::{
    api::{
        error::{ApiError, ErrorResponse},
        handlers::{
            auth::{
                AuthState,
                storage::{NewCredentialsUser, insert_credentials_user},
            },
            json_payload, non_blank, normalize_email, valid_email,
        },
    },
    password::{
        PasswordPolicy, generate_salt, hash_password_with_iterations,
        validate_password_complexity,
    },
};

#[derive(ToSchema, Deserialize)]
pub struct UserRegister {
    email: Option<String>,
    name: Option<String>,
    password: Option<String>,
}

impl std::fmt::Debug for UserRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRegister")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RegisterResponse {
    success: bool,
    message: String,
}

/// A request that passed every check, ready to hash and store.
#[derive(Debug, PartialEq, Eq)]
struct ValidRegistration<'a> {
    email: String,
    name: Option<&'a str>,
    password: &'a str,
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = UserRegister,
    responses(
        (status = 201, description = "Registration successful", body = RegisterResponse),
        (
            status = 400,
            description = "Missing fields, invalid email, or weak password",
            body = ErrorResponse
        ),
        (
            status = 409,
            description = "User with the specified email already exists",
            body = ErrorResponse
        ),
        (status = 500, description = "Registration failed", body = ErrorResponse)
    ),
    tag = "register"
)]
#[instrument(skip(pool, auth_state, payload))]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<UserRegister>, JsonRejection>,
) -> Response {
    let request = match json_payload(payload) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    debug!("user: {:?}", request);

    let config = auth_state.config();
    let valid = match validate_registration(&request, config.password_policy()) {
        Ok(valid) => valid,
        Err(err) => return err.into_response(),
    };

    // PBKDF2 runs off the async runtime.
    let salt = generate_salt();
    let password = valid.password.to_string();
    let iterations = config.kdf_iterations();
    let hash = {
        let salt = salt.clone();
        match tokio::task::spawn_blocking(move || {
            hash_password_with_iterations(&password, &salt, iterations)
        })
        .await
        {
            Ok(hash) => hash,
            Err(err) => {
                return ApiError::Internal(format!("password hashing task: {err}")).into_response();
            }
        }
    };

    let new_user = NewCredentialsUser {
        email: &valid.email,
        name: valid.name,
        password_hash: &hash,
        salt: &salt,
        kdf_iterations: iterations,
    };
    match insert_credentials_user(&pool, &new_user).await {
        Ok(user_id) => {
            info!(user_id = %user_id, "Registered credentials user");
            let body = RegisterResponse {
                success: true,
                message: "User registered successfully".to_string(),
            };
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// Checks run in order: required fields, email format, password policy.
fn validate_registration<'a>(
    request: &'a UserRegister,
    policy: &PasswordPolicy,
) -> Result<ValidRegistration<'a>, ApiError> {
    let email = non_blank(request.email.as_deref());
    let password = request.password.as_deref().filter(|p| !p.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::validation("Email and password are required"));
    };

    let email = normalize_email(email);
    if !valid_email(&email) {
        return Err(ApiError::validation("Invalid email"));
    }

    validate_password_complexity(password, policy)
        .map_err(|err| ApiError::validation(err.to_string()))?;

    Ok(ValidRegistration {
        email,
        name: non_blank(request.name.as_deref()),
        password,
    })
}
