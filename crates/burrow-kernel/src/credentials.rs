//! Password hashing and verification.
//!
//! New hashes are Argon2id PHC strings
//! (`$argon2id$v=19$m=19456,t=2,p=1$<salt>$<hash>`) at the `argon2` crate
//! default work factor: 19 MiB of memory, 2 passes, 1 lane. Bcrypt hashes
//! (`$2a$`, `$2b$`, `$2y$`) from older dave configs still verify.

use std::sync::LazyLock;

use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use thiserror::Error;

/// Hashing failed (entropy source or parameter error).
#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct CredentialError(password_hash::Error);

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Stand-in hash for users that don't exist.
static ABSENT_USER_HASH: LazyLock<Option<String>> = LazyLock::new(|| hash(b"burrow-absent-user").ok());

/// Hash a password for storage in the `users` section of the config.
pub fn hash(password: &[u8]) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password, &salt)
        .map(|hash| hash.to_string())
        .map_err(CredentialError)
}

/// Check a candidate password against a stored hash.
///
/// A stored value that is neither a bcrypt hash nor a valid PHC string never
/// verifies. Comparison is the constant-time check inside `bcrypt` or `argon2`.
pub fn verify(hash: &str, candidate: &[u8]) -> bool {
    if BCRYPT_PREFIXES.iter().any(|prefix| hash.starts_with(prefix)) {
        return bcrypt::verify(candidate, hash).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "stored bcrypt hash is malformed");
            false
        });
    }

    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::debug!("stored password hash is not a PHC string");
        return false;
    };
    Argon2::default().verify_password(candidate, &parsed).is_ok()
}

/// Spend the same work as [`verify`] for a username that isn't configured,
/// then fail. Keeps unknown and known usernames indistinguishable by timing.
pub fn verify_absent(candidate: &[u8]) -> bool {
    if let Some(hash) = ABSENT_USER_HASH.as_deref() {
        let _ = verify(hash, candidate);
    }
    false
}
