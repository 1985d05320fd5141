use crate::api::{
    self,
    handlers::auth::{AuthConfig, AuthState, GoogleConfig, SessionKey},
};
use crate::cli::commands::auth::Options;
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::info;
use url::Url;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub redirect_url: String,
    pub auth: Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the HTTP client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let Args {
        port,
        dsn,
        redirect_url,
        auth,
    } = args;

    let mut config = AuthConfig::new(auth.frontend_base_url)
        .with_session_ttl_seconds(auth.session_ttl_seconds)
        .with_password_policy(auth.password_policy)
        .with_kdf_iterations(auth.kdf_iterations);
    if let Some(google) = auth.google {
        config = config.with_google(GoogleConfig::new(
            google.client_id,
            google.client_secret,
            redirect_url,
        ));
    }

    let http = reqwest::Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let auth_state = AuthState::new(config, SessionKey::new(auth.session_secret), http);

    api::new(port, dsn, Arc::new(auth_state)).await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("frontend_base_url", args.auth.frontend_base_url.clone()),
        ("public_url", args.auth.public_url.clone()),
        (
            "session_ttl_seconds",
            args.auth.session_ttl_seconds.to_string(),
        ),
        ("kdf_iterations", args.auth.kdf_iterations.to_string()),
        ("federated", args.auth.google.is_some().to_string()),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "potemkin {} ({})\n\n{title}:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
