//! Auth storage tests against a throwaway Postgres.

use anyhow::{Context, Result, anyhow};
use sqlx::Row;

use super::credentials::authenticate;
use super::storage::{
    AUTH_TYPE_CREDENTIALS, AUTH_TYPE_FEDERATED, FederatedProfile, NewCredentialsUser,
    find_user_by_email, insert_credentials_user, upsert_federated_user,
};
use crate::api::{error::ApiError, handlers::test_db::TestDb};
use crate::password::{generate_salt, hash_password_with_iterations};

const ITERATIONS: u32 = 10;

fn profile(email: &str, name: &str) -> FederatedProfile {
    FederatedProfile {
        email: email.to_string(),
        name: Some(name.to_string()),
        picture: Some(format!("https://img.example.com/{name}.png")),
    }
}

async fn insert_credentials(
    db: &TestDb,
    email: &str,
    password: &str,
) -> Result<String, ApiError> {
    let salt = generate_salt();
    let hash = hash_password_with_iterations(password, &salt, ITERATIONS);
    insert_credentials_user(
        &db.pool,
        &NewCredentialsUser {
            email,
            name: Some("Alice"),
            password_hash: &hash,
            salt: &salt,
            kdf_iterations: ITERATIONS,
        },
    )
    .await
}

#[tokio::test]
async fn federated_upsert_creates_then_refreshes() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let first = upsert_federated_user(&db.pool, &profile("fed@example.com", "Fed")).await?;
    assert_eq!(first.auth_type, AUTH_TYPE_FEDERATED);
    assert_eq!(first.name.as_deref(), Some("Fed"));
    assert!(first.password_hash.is_none());

    let second = upsert_federated_user(&db.pool, &profile("fed@example.com", "Renamed")).await?;
    assert_eq!(second.id, first.id);
    assert_eq!(second.name.as_deref(), Some("Renamed"));
    assert_eq!(
        second.picture.as_deref(),
        Some("https://img.example.com/Renamed.png")
    );

    let row = sqlx::query(
        "SELECT COUNT(*) AS total, bool_and(updated_at >= created_at) AS ordered FROM users",
    )
        .fetch_one(&db.pool)
        .await?;
    assert_eq!(row.get::<i64, _>("total"), 1);
    assert!(row.get::<bool, _>("ordered"));
    Ok(())
}

#[tokio::test]
async fn federated_upsert_keeps_password_fields() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let user_id = insert_credentials(&db, "alice@example.com", "Secret1!")
        .await
        .map_err(|err| anyhow!("insert credentials user: {err}"))?;
    let before = find_user_by_email(&db.pool, "alice@example.com")
        .await?
        .context("user missing")?;

    let after =
        upsert_federated_user(&db.pool, &profile("alice@example.com", "Google Alice")).await?;
    assert_eq!(after.id, user_id);
    assert_eq!(after.auth_type, AUTH_TYPE_CREDENTIALS);
    assert_eq!(after.password_hash, before.password_hash);
    assert_eq!(after.salt, before.salt);
    assert_eq!(after.name.as_deref(), Some("Google Alice"));

    // The password still works after the federated refresh.
    let identity = authenticate(&db.pool, "alice@example.com", "Secret1!").await;
    assert_eq!(identity.map(|i| i.id), Some(user_id));
    Ok(())
}

#[tokio::test]
async fn concurrent_first_federated_sign_ins_share_one_row() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let one = profile("race@example.com", "One");
    let two = profile("race@example.com", "Two");
    let (first, second) = tokio::join!(
        upsert_federated_user(&db.pool, &one),
        upsert_federated_user(&db.pool, &two)
    );
    assert_eq!(first?.id, second?.id);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind("race@example.com")
        .fetch_one(&db.pool)
        .await?;
    assert_eq!(total, 1);
    Ok(())
}

#[tokio::test]
async fn duplicate_credentials_email_conflicts() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let first = insert_credentials(&db, "dup@example.com", "Secret1!").await;
    assert!(first.is_ok());
    let second = insert_credentials(&db, "dup@example.com", "Other1!x").await;
    assert!(matches!(second, Err(ApiError::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn credentials_authenticate_against_postgres() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    insert_credentials(&db, "bob@example.com", "Secret1!")
        .await
        .map_err(|err| anyhow!("insert credentials user: {err}"))?;
    upsert_federated_user(&db.pool, &profile("fed@example.com", "Fed")).await?;

    assert!(
        authenticate(&db.pool, "bob@example.com", "Secret1!")
            .await
            .is_some()
    );
    assert!(
        authenticate(&db.pool, "bob@example.com", "Wrong1!x")
            .await
            .is_none()
    );
    // Federated users have no password to check.
    assert!(
        authenticate(&db.pool, "fed@example.com", "")
            .await
            .is_none()
    );
    assert!(
        authenticate(&db.pool, "fed@example.com", "Secret1!")
            .await
            .is_none()
    );
    Ok(())
}

mod router {
    use super::*;
    use crate::api::{
        app,
        handlers::auth::{AuthConfig, AuthState, SessionKey},
    };
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{
            Request, StatusCode,
            header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        },
    };
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app(db: &TestDb) -> Result<Router> {
        app_with_iterations(db, ITERATIONS)
    }

    fn app_with_iterations(db: &TestDb, iterations: u32) -> Result<Router> {
        let state = AuthState::new(
            AuthConfig::new("http://localhost:3000".to_string()).with_kdf_iterations(iterations),
            SessionKey::new(SecretString::from("0123456789abcdef0123456789abcdef")),
            reqwest::Client::new(),
        );
        app(db.pool.clone(), Arc::new(state))
    }

    async fn post_json(
        app: &Router,
        uri: &str,
        body: Value,
    ) -> Result<(StatusCode, Option<String>, Value)> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?;
        let response = app.clone().oneshot(request).await?;
        let status = response.status();
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Ok((status, cookie, value))
    }

    #[tokio::test]
    async fn register_twice_conflicts() -> Result<()> {
        let Ok(db) = TestDb::new().await else {
            return Ok(());
        };
        let app = test_app(&db)?;
        let body = json!({
            "email": "carol@example.com",
            "name": "Carol",
            "password": "Uppercase1!"
        });

        let (status, _, first) = post_json(&app, "/register", body.clone()).await?;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first, json!({"success": true, "message": "User registered successfully"}));

        let (status, _, second) = post_json(&app, "/register", body).await?;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(second["error"], "User with this email already exists");

        // Same address, different case: still the same user.
        let shouted = json!({"email": "CAROL@example.com", "password": "Uppercase1!"});
        let (status, _, _) = post_json(&app, "/register", shouted).await?;
        assert_eq!(status, StatusCode::CONFLICT);
        Ok(())
    }

    #[tokio::test]
    async fn weak_password_is_not_stored() -> Result<()> {
        let Ok(db) = TestDb::new().await else {
            return Ok(());
        };
        let app = test_app(&db)?;
        let body = json!({"email": "dave@example.com", "password": "Uppercase!"});

        let (status, _, value) = post_json(&app, "/register", body).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"], "Password must contain at least one number");
        assert!(find_user_by_email(&db.pool, "dave@example.com").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn register_login_and_read_session() -> Result<()> {
        let Ok(db) = TestDb::new().await else {
            return Ok(());
        };
        let app = test_app(&db)?;
        let credentials = json!({"email": "erin@example.com", "password": "Uppercase1!"});

        let (status, _, _) = post_json(&app, "/register", credentials.clone()).await?;
        assert_eq!(status, StatusCode::CREATED);

        let wrong = json!({"email": "erin@example.com", "password": "Uppercase2!"});
        let (status, cookie, value) = post_json(&app, "/auth/login", wrong).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(cookie.is_none());
        assert_eq!(value["error"], "Invalid credentials");

        let (status, cookie, value) = post_json(&app, "/auth/login", credentials).await?;
        assert_eq!(status, StatusCode::OK);
        assert!(value["token"].is_string());
        let cookie = cookie.context("session cookie")?;
        let pair = cookie.split(';').next().context("cookie pair")?.to_string();

        let request = Request::builder()
            .uri("/auth/session")
            .header(COOKIE, pair)
            .body(Body::empty())?;
        let response = app.clone().oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let session: Value = serde_json::from_slice(&bytes)?;
        assert_eq!(session["email"], "erin@example.com");
        assert!(session.get("token").is_none());

        let request = Request::builder().uri("/auth/session").body(Body::empty())?;
        let response = app.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        Ok(())
    }

    #[tokio::test]
    async fn raising_iterations_keeps_existing_logins() -> Result<()> {
        let Ok(db) = TestDb::new().await else {
            return Ok(());
        };
        let before = app_with_iterations(&db, 1000)?;
        let credentials = json!({"email": "frank@example.com", "password": "Uppercase1!"});

        let (status, _, _) = post_json(&before, "/register", credentials.clone()).await?;
        assert_eq!(status, StatusCode::CREATED);

        let row = sqlx::query("SELECT kdf_iterations FROM users WHERE email = $1")
            .bind("frank@example.com")
            .fetch_one(&db.pool)
            .await?;
        assert_eq!(row.get::<Option<i32>, _>("kdf_iterations"), Some(1000));

        let after = app_with_iterations(&db, 2000)?;
        let (status, cookie, _) = post_json(&after, "/auth/login", credentials).await?;
        assert_eq!(status, StatusCode::OK);
        assert!(cookie.is_some());

        // New registrations pick up the raised count.
        let newcomer = json!({"email": "grace@example.com", "password": "Uppercase1!"});
        let (status, _, _) = post_json(&after, "/register", newcomer).await?;
        assert_eq!(status, StatusCode::CREATED);
        let row = sqlx::query("SELECT kdf_iterations FROM users WHERE email = $1")
            .bind("grace@example.com")
            .fetch_one(&db.pool)
            .await?;
        assert_eq!(row.get::<Option<i32>, _>("kdf_iterations"), Some(2000));
        Ok(())
    }
}
