//! Signed session credentials and the cookie that carries them.
//!
//! Sessions are short-lived HS256 tokens embedding the account id, email,
//! and the account's credential epoch (`token_version`). A password change
//! increments the epoch, so every previously issued session stops
//! validating without any server-side revocation list.

use anyhow::{Context, Result};
use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::ApiError;

use super::state::AuthState;
use super::storage::{self, AccountRecord};

pub(crate) const SESSION_COOKIE_NAME: &str = "portero_session";

const NOT_AUTHENTICATED: &str = "Not authenticated";

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SessionClaims {
    /// Account id.
    pub(crate) sub: String,
    pub(crate) email: String,
    /// Credential epoch at issuance.
    pub(crate) token_version: i64,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

/// Issue a signed session credential for the account.
pub(crate) fn issue_session(state: &AuthState, account: &AccountRecord) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = SessionClaims {
        sub: account.id.to_string(),
        email: account.email.clone(),
        token_version: account.token_version,
        iat: now,
        exp: now + state.config().session_ttl_seconds(),
    };
    encode(&Header::default(), &claims, &state.session_keys().encoding)
        .context("failed to sign session credential")
}

/// Decode and validate a session credential's signature and expiry.
///
/// The credential epoch is checked separately against the live account.
pub(crate) fn decode_session(state: &AuthState, token: &str) -> Option<SessionClaims> {
    decode::<SessionClaims>(
        token,
        &state.session_keys().decoding,
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// Extract and validate the request's session claims.
///
/// Signature, expiry, and subject format only; the credential epoch is
/// checked against the live account by the caller.
pub(crate) fn require_claims(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<(Uuid, SessionClaims), ApiError> {
    let token = extract_session_token(headers)
        .ok_or_else(|| ApiError::Authentication(NOT_AUTHENTICATED.to_string()))?;
    let claims = decode_session(state, &token)
        .ok_or_else(|| ApiError::Authentication(NOT_AUTHENTICATED.to_string()))?;
    let account_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::Authentication(NOT_AUTHENTICATED.to_string()))?;
    Ok((account_id, claims))
}

/// Resolve the request's session into a live account.
///
/// Rejects missing/invalid/expired credentials and credentials whose
/// embedded epoch no longer matches the account's current `token_version`.
pub(crate) async fn authenticate(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<AccountRecord, ApiError> {
    let (account_id, claims) = require_claims(headers, state)?;

    let account = storage::lookup_account_by_id(pool, account_id)
        .await?
        .ok_or_else(|| ApiError::Authentication(NOT_AUTHENTICATED.to_string()))?;

    // A stale epoch means the password changed after issuance.
    if claims.token_version != account.token_version {
        return Err(ApiError::Authentication(NOT_AUTHENTICATED.to_string()));
    }

    Ok(account)
}

/// Build the `HttpOnly` strict-site cookie carrying the session credential.
pub(crate) fn session_cookie(
    state: &AuthState,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = state.config().session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={ttl_seconds}"
    );
    if state.config().session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        // A pair without '=' is malformed; skip it and keep scanning.
        let Some((key, val)) = pair.trim().split_once('=') else {
            continue;
        };
        if key.trim() == SESSION_COOKIE_NAME {
            return Some(val.trim().to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::super::state::test_support::auth_state;
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Utc;

    fn account() -> AccountRecord {
        AccountRecord {
            id: Uuid::new_v4(),
            name: "Alice".to_string(),
            email: "a@x.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            email_verified_at: None,
            failed_login_attempts: 0,
            lockout_until: None,
            token_version: 0,
        }
    }

    #[test]
    fn issue_then_decode_round_trips() {
        let state = auth_state();
        let account = account();
        let token = issue_session(&state, &account).unwrap();
        let claims = decode_session(&state, &token).unwrap();
        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.token_version, 0);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn tampered_token_rejected() {
        let state = auth_state();
        let token = issue_session(&state, &account()).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(decode_session(&state, &tampered).is_none());
        assert!(decode_session(&state, "garbage").is_none());
    }

    #[test]
    fn expired_token_rejected() {
        // TTL in the past; default validation leeway is 60s, so go well past it.
        let state = auth_state_with_ttl(-600);
        let token = issue_session(&state, &account()).unwrap();
        assert!(decode_session(&state, &token).is_none());
    }

    fn auth_state_with_ttl(ttl: i64) -> std::sync::Arc<crate::api::handlers::auth::AuthState> {
        super::super::state::test_support::auth_state_with(
            crate::api::handlers::auth::AuthConfig::new("http://localhost:3000".to_string())
                .with_session_ttl_seconds(ttl),
        )
    }

    #[test]
    fn cookie_carries_strict_site_attributes() {
        let state = auth_state();
        let cookie = session_cookie(&state, "tok").unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("portero_session=tok"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Strict"));
        assert!(value.contains("Path=/"));
        assert!(value.contains("Max-Age=3600"));
        // http frontend: no Secure attribute
        assert!(!value.contains("Secure"));
    }

    #[test]
    fn cookie_extraction_handles_multiple_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; portero_session=abc; theme=dark"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc".to_string()));
    }

    #[test]
    fn cookie_extraction_skips_valueless_pairs() {
        // Browsers may send bare flags like `Cookie: flag; name=value`;
        // the session cookie after one must still be found.
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("flag; portero_session=abc"));
        assert_eq!(extract_session_token(&headers), Some("abc".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("flag; another"));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn bearer_token_preferred_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        headers.insert(COOKIE, HeaderValue::from_static("portero_session=abc"));
        assert_eq!(extract_session_token(&headers), Some("xyz".to_string()));
    }

    #[test]
    fn missing_headers_yield_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);
    }
}
