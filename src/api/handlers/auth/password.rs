//! Slow, salted hashing for secrets.
//!
//! Used for account passwords and for password-reset token secrets: both
//! are stored as Argon2 PHC strings with a per-call random salt, so no
//! separate salt storage exists and two hashes of the same input never
//! match byte-for-byte.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

/// Hash a secret into a self-describing PHC string.
pub(crate) fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash secret: {err}"))
}

/// Verify a secret against a stored digest.
///
/// Returns false on mismatch and on an unparsable digest; never errors.
pub(crate) fn verify_secret(secret: &str, digest: &str) -> bool {
    PasswordHash::new(digest).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    })
}
