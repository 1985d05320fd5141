//! Error taxonomy shared by every handler.
//!
//! Store and identity provider failures are logged here and surfaced with a
//! generic body so internal detail never reaches the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),
    /// No session, or a session that failed verification.
    #[error("Unauthorized")]
    Unauthenticated,
    /// A sign-in attempt was rejected. Every cause reads the same.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// A unique key is already taken.
    #[error("{0}")]
    Conflict(String),
    /// The resource does not exist or belongs to someone else.
    #[error("Not found")]
    NotFound,
    /// The external identity provider failed or returned garbage.
    #[error("identity provider error: {0}")]
    Provider(String),
    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Store(err) => {
                error!("Database error: {err}");
                "Internal server error".to_string()
            }
            Self::Internal(detail) => {
                error!("Internal error: {detail}");
                "Internal server error".to_string()
            }
            Self::Provider(detail) => {
                error!("Identity provider error: {detail}");
                "Sign-in with the identity provider failed".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
