//! SQL storage helpers for user rows.

use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::{
    api::{error::ApiError, handlers::is_unique_violation},
    password::DEFAULT_KDF_ITERATIONS,
};

pub(crate) const AUTH_TYPE_CREDENTIALS: &str = "credentials";
pub(crate) const AUTH_TYPE_FEDERATED: &str = "federated";

const USER_COLUMNS: &str =
    "id, email, name, picture, password_hash, salt, kdf_iterations, auth_type";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct UserRecord {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) name: Option<String>,
    pub(crate) picture: Option<String>,
    pub(crate) password_hash: Option<String>,
    pub(crate) salt: Option<String>,
    /// PBKDF2 iterations the hash was made with. `NULL` on rows written
    /// before the count was recorded.
    pub(crate) kdf_iterations: Option<i32>,
    pub(crate) auth_type: String,
}

impl UserRecord {
    fn from_row(row: &PgRow) -> Self {
        Self {
            id: row.get("id"),
            email: row.get("email"),
            name: row.get("name"),
            picture: row.get("picture"),
            password_hash: row.get("password_hash"),
            salt: row.get("salt"),
            kdf_iterations: row.get("kdf_iterations"),
            auth_type: row.get("auth_type"),
        }
    }

    /// Iteration count to verify this row's hash with. `None` when the stored
    /// value is not a positive count.
    pub(crate) fn stored_iterations(&self) -> Option<u32> {
        match self.kdf_iterations {
            None => Some(DEFAULT_KDF_ITERATIONS),
            Some(count) => u32::try_from(count).ok().filter(|count| *count > 0),
        }
    }
}

/// Fields for a new credentials user. The hash and salt are already derived.
pub(crate) struct NewCredentialsUser<'a> {
    pub(crate) email: &'a str,
    pub(crate) name: Option<&'a str>,
    pub(crate) password_hash: &'a str,
    pub(crate) salt: &'a str,
    pub(crate) kdf_iterations: u32,
}

/// Profile returned by an identity provider after it verified the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FederatedProfile {
    pub(crate) email: String,
    pub(crate) name: Option<String>,
    pub(crate) picture: Option<String>,
}

pub(crate) async fn find_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(UserRecord::from_row))
}

pub(crate) async fn find_user_by_id(
    pool: &PgPool,
    user_id: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(UserRecord::from_row))
}

/// Insert a credentials user and return its id.
///
/// A duplicate email maps to `409`. The unique constraint decides, so two
/// concurrent registrations for one email cannot both succeed.
pub(crate) async fn insert_credentials_user(
    pool: &PgPool,
    user: &NewCredentialsUser<'_>,
) -> Result<String, ApiError> {
    let user_id = Uuid::new_v4().to_string();
    let kdf_iterations = i32::try_from(user.kdf_iterations).map_err(|_| {
        ApiError::Internal(format!(
            "KDF iterations out of range: {}",
            user.kdf_iterations
        ))
    })?;
    let query = r"
        INSERT INTO users (id, email, name, password_hash, salt, kdf_iterations, auth_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    match sqlx::query(query)
        .bind(&user_id)
        .bind(user.email)
        .bind(user.name)
        .bind(user.password_hash)
        .bind(user.salt)
        .bind(kdf_iterations)
        .bind(AUTH_TYPE_CREDENTIALS)
        .execute(pool)
        .instrument(span)
        .await
    {
        Ok(_) => Ok(user_id),
        Err(err) if is_unique_violation(&err) => Err(ApiError::Conflict(
            "User with this email already exists".to_string(),
        )),
        Err(err) => Err(ApiError::Store(err)),
    }
}

/// Create or refresh the local user for a federated sign-in.
///
/// New rows are `federated`. Existing rows only get their name, picture, and
/// `updated_at` refreshed; password fields and auth type are left alone. The
/// conflict clause makes a racing first sign-in land as an update.
pub(crate) async fn upsert_federated_user(
    pool: &PgPool,
    profile: &FederatedProfile,
) -> Result<UserRecord, sqlx::Error> {
    let query = format!(
        r"
        INSERT INTO users (id, email, name, picture, auth_type)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name,
                picture = EXCLUDED.picture,
                updated_at = NOW()
        RETURNING {USER_COLUMNS}
        "
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(Uuid::new_v4().to_string())
        .bind(&profile.email)
        .bind(profile.name.as_deref())
        .bind(profile.picture.as_deref())
        .bind(AUTH_TYPE_FEDERATED)
        .fetch_one(pool)
        .instrument(span)
        .await?;
    Ok(UserRecord::from_row(&row))
}
