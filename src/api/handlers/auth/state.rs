//! Auth state and configuration.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::password::{DEFAULT_KDF_ITERATIONS, PasswordPolicy};

use super::{
    google::{GoogleConfig, GoogleProvider},
    token::SessionKey,
};

// 30 days
const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    password_policy: PasswordPolicy,
    kdf_iterations: u32,
    google: Option<GoogleConfig>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url: frontend_base_url.trim_end_matches('/').to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            password_policy: PasswordPolicy::default(),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            google: None,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    #[must_use]
    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }

    /// Offer Google sign-in alongside credentials.
    #[must_use]
    pub fn with_google(mut self, google: GoogleConfig) -> Self {
        self.google = Some(google);
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.password_policy
    }

    #[must_use]
    pub fn kdf_iterations(&self) -> u32 {
        self.kdf_iterations
    }

    #[must_use]
    pub fn federated_enabled(&self) -> bool {
        self.google.is_some()
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// Shared, immutable auth state injected into handlers.
#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
    session_key: SessionKey,
    google: Option<GoogleProvider>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, session_key: SessionKey, http: reqwest::Client) -> Self {
        let google = config
            .google
            .clone()
            .map(|google| GoogleProvider::new(google, http));
        Self {
            config,
            session_key,
            google,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    pub(super) fn google(&self) -> Option<&GoogleProvider> {
        self.google.as_ref()
    }
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}
