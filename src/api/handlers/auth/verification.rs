//! Email verification and email-change redemption.
//!
//! Both flows share the single-use shape: find the unexpired token by
//! exact value and kind, apply the effect, delete the token in the same
//! transaction.

use anyhow::Context;
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::error::ApiError;

use super::state::AuthState;
use super::storage;
use super::tokens::TokenKind;
use super::types::{MessageResponse, VerifyTokenQuery};

const INVALID_TOKEN: &str = "Invalid or expired token";
const EMAIL_TAKEN: &str = "An account with this email already exists";

/// Redeem an email-verification link.
#[utoipa::path(
    get,
    path = "/v1/auth/verify",
    params(
        ("token" = Option<String>, Query, description = "Verification token from the email link")
    ),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid/expired token")
    ),
    tag = "auth"
)]
pub async fn verify_email(
    pool: Extension<PgPool>,
    query: Query<VerifyTokenQuery>,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Validation(INVALID_TOKEN.to_string()))?;

    let Some(record) = storage::lookup_token(&pool, TokenKind::EmailVerification, token).await?
    else {
        return Err(ApiError::Validation(INVALID_TOKEN.to_string()));
    };

    let mut tx = pool
        .begin()
        .await
        .context("failed to start verify transaction")?;
    storage::mark_email_verified(&mut *tx, record.account_id).await?;
    storage::delete_token(&mut *tx, record.id).await?;
    tx.commit()
        .await
        .context("failed to commit verify transaction")?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Email verified. You can now log in.".to_string(),
        }),
    )
        .into_response())
}

/// Redeem an email-change confirmation link.
///
/// On success the browser is sent back to the frontend with
/// `?email_updated=true`.
#[utoipa::path(
    get,
    path = "/v1/auth/verify-new-email",
    params(
        ("token" = Option<String>, Query, description = "Email-change token from the email link")
    ),
    responses(
        (status = 303, description = "Email updated, redirect to frontend"),
        (status = 400, description = "Invalid/expired token"),
        (status = 409, description = "New email taken since the token was issued")
    ),
    tag = "auth"
)]
pub async fn verify_new_email(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    query: Query<VerifyTokenQuery>,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Validation(INVALID_TOKEN.to_string()))?;

    let Some(record) = storage::lookup_token(&pool, TokenKind::EmailChange, token).await? else {
        return Err(ApiError::Validation(INVALID_TOKEN.to_string()));
    };
    // An email-change token without a pending address is malformed.
    let Some(new_email) = record.new_email.as_deref() else {
        return Err(ApiError::Validation(INVALID_TOKEN.to_string()));
    };

    let mut tx = pool
        .begin()
        .await
        .context("failed to start email-change transaction")?;
    // The unique constraint decides; a claim raced since issuance rolls
    // back the whole redemption and the token stays live.
    if !storage::update_email(&mut *tx, record.account_id, new_email).await? {
        let _ = tx.rollback().await;
        return Err(ApiError::Conflict(EMAIL_TAKEN.to_string()));
    }
    storage::delete_token(&mut *tx, record.id).await?;
    tx.commit()
        .await
        .context("failed to commit email-change transaction")?;

    let target = format!(
        "{}/?email_updated=true",
        auth_state.config().frontend_base_url().trim_end_matches('/')
    );
    Ok(Redirect::to(&target).into_response())
}
