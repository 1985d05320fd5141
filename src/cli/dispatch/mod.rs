use crate::cli::{
    actions::{Action, server::Args},
    commands::{self, auth},
};
use anyhow::{Context, Result};
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(commands::ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let options = auth::Options::parse(matches)?;

    Url::parse(&options.frontend_base_url).context("invalid POTEMKIN_FRONTEND_BASE_URL")?;
    let public_url = Url::parse(&options.public_url).context("invalid POTEMKIN_PUBLIC_URL")?;
    let redirect_url = format!(
        "{}/auth/google/callback",
        public_url.as_str().trim_end_matches('/')
    );

    Ok(Action::Server(Args {
        port,
        dsn,
        redirect_url,
        auth: options,
    }))
}
