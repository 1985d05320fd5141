//! # Potemkin (company formation records)
//!
//! `potemkin` is a small JSON API that lets a signed-in user draft company
//! formation records together with the founders attached to them.
//!
//! ## Sign-in
//!
//! Two sign-in methods are supported:
//!
//! - **Credentials:** email and password. Passwords are stored as a salted
//!   PBKDF2-HMAC-SHA512 hash, and registration enforces a configurable
//!   complexity policy (see [`password`]).
//! - **Federated:** Google OAuth2, enabled with `--federated`. The local user
//!   row is upserted by email on every successful sign-in.
//!
//! Both methods end in the same signed session token, delivered as an
//! `HttpOnly` cookie. Failed credential checks are reported as a single
//! "invalid credentials" outcome regardless of the cause.
//!
//! ## Companies
//!
//! Companies are owned by exactly one user and start in the `draft` status.
//! A company and its founders are written in one transaction. Reads are
//! always scoped to the caller; another user's company is reported as
//! `404 Not Found`.

pub mod api;
pub mod cli;
pub mod password;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
