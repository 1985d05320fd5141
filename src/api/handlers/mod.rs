//! API handlers and shared helpers.

pub mod auth;
pub mod companies;
pub mod health;
pub mod root;
pub mod user_register;

#[cfg(test)]
pub(crate) mod test_db;

use crate::api::error::ApiError;
use axum::{Json, extract::rejection::JsonRejection};
use regex::Regex;
use tracing::debug;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email_normalized))
}

/// Trimmed value of an optional field, `None` when missing or blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Unwrap a JSON body, turning extractor rejections into a 400.
pub(crate) fn json_payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!("Rejected JSON payload: {rejection}");
            Err(ApiError::validation("Invalid JSON payload"))
        }
    }
}
