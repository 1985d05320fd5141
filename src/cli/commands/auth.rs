use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::{ExposeSecret, SecretString};

use crate::api::handlers::auth::token::MIN_SECRET_BYTES;
use crate::password::{DEFAULT_KDF_ITERATIONS, PasswordPolicy};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_PUBLIC_URL: &str = "public-url";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_PASSWORD_MIN_LENGTH: &str = "password-min-length";
pub const ARG_PASSWORD_REQUIRE_UPPERCASE: &str = "password-require-uppercase";
pub const ARG_PASSWORD_REQUIRE_NUMBER: &str = "password-require-number";
pub const ARG_PASSWORD_REQUIRE_SPECIAL_CHAR: &str = "password-require-special-char";
pub const ARG_KDF_ITERATIONS: &str = "kdf-iterations";
pub const ARG_FEDERATED: &str = "federated";
pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_CLIENT_SECRET: &str = "google-client-secret";

pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    let command = with_password_args(command);
    with_federated_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL (CORS origin and post sign-in redirects)")
                .env("POTEMKIN_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_PUBLIC_URL)
                .long(ARG_PUBLIC_URL)
                .help("Externally reachable base URL of this API (OAuth redirect target)")
                .env("POTEMKIN_PUBLIC_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("HMAC key for session tokens, at least 32 bytes")
                .env("POTEMKIN_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds")
                .env("POTEMKIN_SESSION_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}

fn with_password_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PASSWORD_MIN_LENGTH)
                .long(ARG_PASSWORD_MIN_LENGTH)
                .help("Minimum password length in characters")
                .env("POTEMKIN_PASSWORD_MIN_LENGTH")
                .default_value("8")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_PASSWORD_REQUIRE_UPPERCASE)
                .long(ARG_PASSWORD_REQUIRE_UPPERCASE)
                .help("Require at least one uppercase letter")
                .env("POTEMKIN_PASSWORD_REQUIRE_UPPERCASE")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_PASSWORD_REQUIRE_NUMBER)
                .long(ARG_PASSWORD_REQUIRE_NUMBER)
                .help("Require at least one digit")
                .env("POTEMKIN_PASSWORD_REQUIRE_NUMBER")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_PASSWORD_REQUIRE_SPECIAL_CHAR)
                .long(ARG_PASSWORD_REQUIRE_SPECIAL_CHAR)
                .help("Require at least one special character")
                .env("POTEMKIN_PASSWORD_REQUIRE_SPECIAL_CHAR")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_KDF_ITERATIONS)
                .long(ARG_KDF_ITERATIONS)
                .help("PBKDF2 iteration count for password hashes")
                .long_help(
                    "PBKDF2 iteration count for new password hashes. Each hash stores the \
                     count it was created with, so raising this keeps existing users signing in.",
                )
                .env("POTEMKIN_KDF_ITERATIONS")
                .default_value("1000")
                .value_parser(clap::value_parser!(u32).range(1..=i64::from(i32::MAX))),
        )
}

fn with_federated_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FEDERATED)
                .long(ARG_FEDERATED)
                .help("Offer Google sign-in alongside email and password")
                .env("POTEMKIN_FEDERATED")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("Google OAuth client id (required with --federated)")
                .env("POTEMKIN_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_SECRET)
                .long(ARG_GOOGLE_CLIENT_SECRET)
                .help("Google OAuth client secret (required with --federated)")
                .env("POTEMKIN_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true),
        )
}

#[derive(Debug)]
pub struct GoogleOptions {
    pub client_id: String,
    pub client_secret: SecretString,
}

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub public_url: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub password_policy: PasswordPolicy,
    pub kdf_iterations: u32,
    pub google: Option<GoogleOptions>,
}

impl Options {
    /// Read and cross-check the auth arguments.
    ///
    /// # Errors
    /// Returns an error if the session secret is too short, or if federated
    /// sign-in is enabled without Google client credentials.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let session_secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .map(|secret| SecretString::from(secret.as_str()))
            .context("missing required argument: --session-secret")?;
        if session_secret.expose_secret().len() < MIN_SECRET_BYTES {
            bail!("--{ARG_SESSION_SECRET} must be at least {MIN_SECRET_BYTES} bytes");
        }

        let google = if matches.get_flag(ARG_FEDERATED) {
            let client_id = matches
                .get_one::<String>(ARG_GOOGLE_CLIENT_ID)
                .cloned()
                .context(
                    "missing required argument: --google-client-id (required with --federated)",
                )?;
            let client_secret = matches
                .get_one::<String>(ARG_GOOGLE_CLIENT_SECRET)
                .map(|secret| SecretString::from(secret.as_str()))
                .context(
                    "missing required argument: --google-client-secret (required with --federated)",
                )?;
            Some(GoogleOptions {
                client_id,
                client_secret,
            })
        } else {
            None
        };

        let password_policy = PasswordPolicy {
            min_length: matches
                .get_one::<usize>(ARG_PASSWORD_MIN_LENGTH)
                .copied()
                .unwrap_or(8),
            require_uppercase: flag_or_true(matches, ARG_PASSWORD_REQUIRE_UPPERCASE),
            require_number: flag_or_true(matches, ARG_PASSWORD_REQUIRE_NUMBER),
            require_special_char: flag_or_true(matches, ARG_PASSWORD_REQUIRE_SPECIAL_CHAR),
        };

        Ok(Self {
            frontend_base_url: string_arg(matches, ARG_FRONTEND_BASE_URL)?,
            public_url: string_arg(matches, ARG_PUBLIC_URL)?,
            session_secret,
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(2_592_000),
            password_policy,
            kdf_iterations: matches
                .get_one::<u32>(ARG_KDF_ITERATIONS)
                .copied()
                .unwrap_or(DEFAULT_KDF_ITERATIONS),
            google,
        })
    }
}

fn string_arg(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}

fn flag_or_true(matches: &ArgMatches, id: &str) -> bool {
    matches.get_one::<bool>(id).copied().unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn parse(args: &[&str]) -> Result<Options> {
        let mut argv = vec!["potemkin", "--session-secret", SECRET];
        argv.extend_from_slice(args);
        let matches = with_args(Command::new("potemkin")).try_get_matches_from(argv)?;
        Options::parse(&matches)
    }

    fn without_auth_env<R>(f: impl FnOnce() -> R) -> R {
        temp_env::with_vars(
            [
                ("POTEMKIN_FEDERATED", None::<&str>),
                ("POTEMKIN_GOOGLE_CLIENT_ID", None),
                ("POTEMKIN_GOOGLE_CLIENT_SECRET", None),
                ("POTEMKIN_PASSWORD_MIN_LENGTH", None),
                ("POTEMKIN_PASSWORD_REQUIRE_UPPERCASE", None),
                ("POTEMKIN_KDF_ITERATIONS", None),
            ],
            f,
        )
    }

    #[test]
    fn defaults() -> Result<()> {
        without_auth_env(|| {
            let options = parse(&[])?;
            assert_eq!(options.frontend_base_url, "http://localhost:3000");
            assert_eq!(options.session_ttl_seconds, 2_592_000);
            assert_eq!(options.password_policy, PasswordPolicy::default());
            assert_eq!(options.kdf_iterations, DEFAULT_KDF_ITERATIONS);
            assert!(options.google.is_none());
            Ok(())
        })
    }

    #[test]
    fn short_secret_is_rejected() {
        let matches = with_args(Command::new("potemkin"))
            .try_get_matches_from(["potemkin", "--session-secret", "too-short"]);
        let result = matches.map_err(anyhow::Error::from).and_then(|m| Options::parse(&m));
        assert!(result.is_err());
    }

    #[test]
    fn policy_flags_are_applied() -> Result<()> {
        without_auth_env(|| {
            let options = parse(&[
                "--password-min-length",
                "12",
                "--password-require-uppercase",
                "false",
                "--password-require-special-char",
                "false",
            ])?;
            assert_eq!(
                options.password_policy,
                PasswordPolicy {
                    min_length: 12,
                    require_uppercase: false,
                    require_number: true,
                    require_special_char: false,
                }
            );
            Ok(())
        })
    }

    #[test]
    fn federated_requires_google_credentials() {
        without_auth_env(|| {
            let result = parse(&["--federated"]);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--google-client-id"));
            }

            let result = parse(&["--federated", "--google-client-id", "id"]);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--google-client-secret"));
            }
        });
    }

    #[test]
    fn federated_with_credentials() -> Result<()> {
        without_auth_env(|| {
            let options = parse(&[
                "--federated",
                "--google-client-id",
                "id",
                "--google-client-secret",
                "secret",
            ])?;
            let google = options.google.context("google options")?;
            assert_eq!(google.client_id, "id");
            assert_eq!(google.client_secret.expose_secret(), "secret");
            Ok(())
        })
    }

    #[test]
    fn zero_kdf_iterations_is_rejected() {
        without_auth_env(|| {
            assert!(parse(&["--kdf-iterations", "0"]).is_err());
        });
    }
}
