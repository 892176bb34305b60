//! # Portero (Authentication & Account Management)
//!
//! `portero` is a credential and token lifecycle service: registration with
//! email verification, password login with brute-force lockout, single-use
//! password-reset tokens, and profile/email-change flows with
//! re-verification.
//!
//! ## Secrets at rest
//!
//! Account passwords and password-reset tokens are stored as Argon2 PHC
//! strings and are never logged or persisted in plaintext. Email
//! verification and email-change tokens are unguessable (256-bit random),
//! short-lived, and single-use, so they are looked up by exact value.
//!
//! ## Credential epoch
//!
//! Every account carries a `token_version`. Session credentials embed the
//! version at issuance and are rejected once a password change increments
//! it, invalidating all previously issued sessions.
//!
//! ## Enumeration resistance
//!
//! Login returns the same generic rejection for unknown emails and wrong
//! passwords, and password-reset requests return the same message whether
//! or not the account exists.

pub mod api;
pub mod cli;

pub const GIT_COMMIT_HASH: &str = env!("PORTERO_GIT_SHA");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
