//! Password reset: rate-limited request flow and hashed-token redemption.

use anyhow::Context;
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::email::{send_best_effort, EmailMessage};
use crate::api::error::ApiError;

use super::password;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage;
use super::tokens::{self, TokenKind};
use super::types::{MessageResponse, RequestPasswordResetRequest, ResetPasswordRequest};
use super::utils::{build_reset_url, extract_client_ip, valid_email, valid_password};

/// Identical whether or not the account exists.
const RESET_REQUESTED: &str = "If an account with this email exists, a reset link has been sent.";
const INVALID_TOKEN: &str = "Invalid or expired token";
const WEAK_PASSWORD: &str = "Password must be at least 8 characters and include \
     lowercase, uppercase, a digit, and a symbol (@$!%*?&)";

/// Request a password reset link.
///
/// Always answers with the same generic message; only the rate limiter
/// can produce a different response.
#[utoipa::path(
    post,
    path = "/v1/auth/request-password-reset",
    request_body = RequestPasswordResetRequest,
    responses(
        (status = 200, description = "Generic acknowledgement", body = MessageResponse),
        (status = 429, description = "Rate limited")
    ),
    tag = "auth"
)]
pub async fn request_password_reset(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RequestPasswordResetRequest>>,
) -> Result<Response, ApiError> {
    // Rate limit first, before any account lookup.
    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::PasswordResetRequest)
        == RateLimitDecision::Limited
    {
        return Err(ApiError::RateLimited);
    }

    let generic = || {
        (
            StatusCode::OK,
            Json(MessageResponse {
                message: RESET_REQUESTED.to_string(),
            }),
        )
            .into_response()
    };

    let Some(Json(request)) = payload else {
        return Ok(generic());
    };
    let email = request.email.trim();
    if !valid_email(email) {
        return Ok(generic());
    }

    let Some(account) = storage::lookup_account_by_email(&pool, email).await? else {
        return Ok(generic());
    };

    let token = tokens::issue_token(
        &pool.0,
        TokenKind::PasswordReset,
        account.id,
        None,
        auth_state.config(),
    )
    .await?;

    let link = build_reset_url(auth_state.config().frontend_base_url(), &token);
    send_best_effort(
        auth_state.mailer(),
        &EmailMessage::with_link(email, "reset_password", &link),
    );

    Ok(generic())
}

/// Redeem a reset token and set a new password.
///
/// Only Argon2 digests of reset tokens are stored, so redemption scans
/// the unexpired rows for a digest match instead of looking up by value.
#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid/expired token or weak password")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let token = request.token.trim();
    if token.is_empty() {
        return Err(ApiError::Validation(INVALID_TOKEN.to_string()));
    }

    // Token first: a bad token with a weak password reports the token
    // error, never the policy one.
    let candidates = storage::load_reset_tokens(&pool).await?;
    let Some(matched) = candidates
        .iter()
        .find(|candidate| password::verify_secret(token, &candidate.secret))
    else {
        return Err(ApiError::Validation(INVALID_TOKEN.to_string()));
    };

    // A weak password must not consume the token.
    if !valid_password(&request.password) {
        return Err(ApiError::Validation(WEAK_PASSWORD.to_string()));
    }

    let password_hash = password::hash_secret(&request.password)?;

    // New hash, epoch bump, and the purge of every outstanding reset token
    // for the account commit together.
    let mut tx = pool
        .begin()
        .await
        .context("failed to start reset transaction")?;
    storage::update_password(&mut *tx, matched.account_id, &password_hash).await?;
    storage::delete_reset_tokens(&mut *tx, matched.account_id).await?;
    tx.commit()
        .await
        .context("failed to commit reset transaction")?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password updated. You can now log in.".to_string(),
        }),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::super::state::test_support::auth_state;
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn reset_password_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = reset_password(Extension(pool), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_empty_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = reset_password(
            Extension(pool),
            Some(Json(ResetPasswordRequest {
                token: "  ".to_string(),
                password: "Str0ng!pw".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn request_reset_invalid_email_is_generic() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = request_password_reset(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(RequestPasswordResetRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn request_reset_missing_payload_is_generic() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = request_password_reset(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
