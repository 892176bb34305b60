//! Single-use, expiring token issuance.
//!
//! Tokens are 32 random bytes, URL-safe base64. Email verification and
//! email-change tokens are unguessable and short-lived, so their value is
//! stored as presented and looked up exactly. Password-reset tokens travel
//! in links an attacker with read access to storage must not be able to
//! replay, so only their Argon2 digest is persisted; the plaintext exists
//! solely in the returned value and the outbound email.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};

use super::password;
use super::state::AuthConfig;
use super::storage;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    EmailVerification,
    PasswordReset,
    EmailChange,
}

impl TokenKind {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::PasswordReset => "password_reset",
            Self::EmailChange => "email_change",
        }
    }
}

/// Create a new random token for out-of-band links.
pub(crate) fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Issue and persist a token, returning the plaintext for the email link.
///
/// `new_email` carries the pending address for `EmailChange` tokens.
pub(crate) async fn issue_token(
    executor: impl sqlx::PgExecutor<'_>,
    kind: TokenKind,
    account_id: Uuid,
    new_email: Option<&str>,
    config: &AuthConfig,
) -> Result<String> {
    let plaintext = generate_token()?;
    let stored = match kind {
        // Hashed at rest; exact lookup is impossible by design.
        TokenKind::PasswordReset => password::hash_secret(&plaintext)?,
        TokenKind::EmailVerification | TokenKind::EmailChange => plaintext.clone(),
    };
    storage::insert_token(
        executor,
        kind,
        account_id,
        &stored,
        new_email,
        config.token_ttl_seconds(),
    )
    .await?;
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    #[test]
    fn kinds_have_stable_discriminants() {
        assert_eq!(TokenKind::EmailVerification.as_str(), "email_verification");
        assert_eq!(TokenKind::PasswordReset.as_str(), "password_reset");
        assert_eq!(TokenKind::EmailChange.as_str(), "email_change");
    }

    #[test]
    fn generated_tokens_are_256_bit() {
        let decoded_len = generate_token()
            .ok()
            .and_then(|token| URL_SAFE_NO_PAD.decode(token.as_bytes()).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn generated_tokens_are_unique() {
        let first = generate_token().unwrap();
        let second = generate_token().unwrap();
        assert_ne!(first, second);
    }
}
