//! Salted password hashing and complexity checks for credential sign-in.
//!
//! Hashes are PBKDF2-HMAC-SHA512 with a 64-byte output, hex encoded. The salt
//! is a hex string and is fed to the KDF as its UTF-8 bytes, so stored rows
//! stay verifiable across releases.
//!
//! The complexity policy is a plain value handed in by the caller; there is no
//! process-wide policy state.

use pbkdf2::pbkdf2_hmac;
use rand::{RngCore, rngs::OsRng};
use sha2::Sha512;
use thiserror::Error;

/// Iteration count for new hashes when none is configured, and the count
/// assumed for stored hashes that predate the per-row count.
pub const DEFAULT_KDF_ITERATIONS: u32 = 1000;

const SALT_BYTES: usize = 16;
const HASH_BYTES: usize = 64;
const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Generate a fresh random salt: 16 bytes from the OS CSPRNG, hex encoded.
#[must_use]
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Derive the hex-encoded hash of `password` with `salt` at the default iteration count.
#[must_use]
pub fn hash_password(password: &str, salt: &str) -> String {
    hash_password_with_iterations(password, salt, DEFAULT_KDF_ITERATIONS)
}

#[must_use]
pub fn hash_password_with_iterations(password: &str, salt: &str, iterations: u32) -> String {
    let mut out = [0u8; HASH_BYTES];
    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    hex::encode(out)
}

/// Check `candidate` against a stored hash and salt.
#[must_use]
pub fn verify_password(candidate: &str, stored_hash: &str, salt: &str) -> bool {
    verify_password_with_iterations(candidate, stored_hash, salt, DEFAULT_KDF_ITERATIONS)
}

#[must_use]
pub fn verify_password_with_iterations(
    candidate: &str,
    stored_hash: &str,
    salt: &str,
    iterations: u32,
) -> bool {
    let computed = hash_password_with_iterations(candidate, salt, iterations);
    constant_time_eq(computed.as_bytes(), stored_hash.as_bytes())
}

/// Byte comparison that inspects every byte of the longer input.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len = a.len().max(b.len());
    let mut diff = a.len() ^ b.len();
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

/// Password complexity rules applied at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_number: bool,
    pub require_special_char: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_number: true,
            require_special_char: true,
        }
    }
}

/// The first rule a password failed. The `Display` text is returned to clients.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {0} characters long")]
    TooShort(usize),
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one number")]
    MissingNumber,
    #[error("Password must contain at least one special character")]
    MissingSpecialChar,
}

/// Validate `password` against `policy`.
///
/// Rules run in a fixed order (length, uppercase, number, special character)
/// and only the first failure is reported.
///
/// # Errors
/// Returns the first rule the password does not satisfy.
pub fn validate_password_complexity(
    password: &str,
    policy: &PasswordPolicy,
) -> Result<(), PasswordPolicyError> {
    if password.chars().count() < policy.min_length {
        return Err(PasswordPolicyError::TooShort(policy.min_length));
    }

    if policy.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PasswordPolicyError::MissingUppercase);
    }

    if policy.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordPolicyError::MissingNumber);
    }

    if policy.require_special_char && !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Err(PasswordPolicyError::MissingSpecialChar);
    }

    Ok(())
}
