//! Auth handlers and supporting modules.
//!
//! Two sign-in methods end in the same place: a signed session token issued
//! as the `potemkin_session` cookie (and, for credential sign-in, in the
//! response body for bearer use).
//!
//! ## Session tokens
//!
//! Tokens are stateless HS256 JWTs carrying the user id and an expiry. Nothing
//! is stored server side, so logout only clears the cookie. Rotating
//! `--session-secret` invalidates every outstanding session.
//!
//! ## Federated sign-in
//!
//! Google is offered when `--federated` is set. The user row is upserted by
//! email on each sign-in; if that write fails the sign-in is rejected.

pub(crate) mod credentials;
mod federated;
pub(crate) mod google;
pub(crate) mod principal;
pub(crate) mod session;
pub(crate) mod state;
pub(crate) mod storage;
pub(crate) mod token;
pub(crate) mod types;

pub use google::GoogleConfig;
pub use principal::{Principal, require_auth};
pub use state::{AuthConfig, AuthState};
pub use token::SessionKey;

#[cfg(test)]
mod tests;
