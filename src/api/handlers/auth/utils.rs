//! Small helpers shared by the auth handlers.

use regex::Regex;
use std::sync::LazyLock;

/// Symbols accepted by the password policy.
const PASSWORD_SYMBOLS: &str = "@$!%*?&";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"));

/// Basic email format check.
///
/// Emails are stored and matched exactly as presented; uniqueness is
/// enforced byte-for-byte by the database constraint.
pub(crate) fn valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Password policy: minimum 8 characters, at least one lowercase, one
/// uppercase, one digit, and one symbol from the fixed allowed set, with
/// every character drawn from that alphabet.
pub(crate) fn valid_password(password: &str) -> bool {
    if password.chars().count() < 8 {
        return false;
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c);
    if !password.chars().all(allowed) {
        return false;
    }
    password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(c))
}

/// Build the frontend link included in verification emails.
pub(crate) fn build_verify_url(frontend_base_url: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/api/v1/auth/verify?token={token}")
}

/// Build the frontend link included in password reset emails.
pub(crate) fn build_reset_url(frontend_base_url: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/reset-password/{token}")
}

/// Build the frontend link included in email-change confirmation emails.
pub(crate) fn build_email_change_url(frontend_base_url: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/api/v1/auth/verify-new-email?token={token}")
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Extract a client IP for rate limiting from common proxy headers.
pub(crate) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
