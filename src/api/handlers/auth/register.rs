//! Account registration.

use anyhow::Context;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::email::{send_best_effort, EmailMessage};
use crate::api::error::ApiError;

use super::password;
use super::state::AuthState;
use super::storage::{self, SignupOutcome};
use super::tokens::{self, TokenKind};
use super::types::{MessageResponse, RegisterRequest};
use super::utils::{build_verify_url, valid_email, valid_password};

const EMAIL_TAKEN: &str = "An account with this email already exists";
const WEAK_PASSWORD: &str = "Password must be at least 8 characters and include \
     lowercase, uppercase, a digit, and a symbol (@$!%*?&)";

/// Create an account and send a verification link to its address.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification email sent", body = MessageResponse),
        (status = 400, description = "Missing fields or weak password"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Missing name".to_string()));
    }
    // Email matched byte-for-byte against the stored value; no normalization.
    let email = request.email.trim();
    if !valid_email(email) {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }
    if !valid_password(&request.password) {
        return Err(ApiError::Validation(WEAK_PASSWORD.to_string()));
    }

    let password_hash = password::hash_secret(&request.password)?;

    // Account row and verification token commit atomically; the email is
    // sent after, best-effort.
    let mut tx = pool
        .begin()
        .await
        .context("failed to start register transaction")?;

    let account_id = match storage::insert_account(&mut *tx, name, email, &password_hash).await? {
        SignupOutcome::Created(id) => id,
        SignupOutcome::Conflict => {
            let _ = tx.rollback().await;
            return Err(ApiError::Conflict(EMAIL_TAKEN.to_string()));
        }
    };

    let token = tokens::issue_token(
        &mut *tx,
        TokenKind::EmailVerification,
        account_id,
        None,
        auth_state.config(),
    )
    .await?;

    tx.commit()
        .await
        .context("failed to commit register transaction")?;

    let link = build_verify_url(auth_state.config().frontend_base_url(), &token);
    send_best_effort(
        auth_state.mailer(),
        &EmailMessage::with_link(email, "verify_email", &link),
    );

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Account registered. Check your email to verify your address.".to_string(),
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

    fn request(name: &str, email: &str, password: &str) -> Json<RegisterRequest> {
        Json(RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    #[tokio::test]
    async fn register_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_empty_name() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
            Extension(pool),
            Extension(auth_state()),
            Some(request("  ", "a@x.com", "Str0ng!pw")),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
            Extension(pool),
            Extension(auth_state()),
            Some(request("Alice", "not-an-email", "Str0ng!pw")),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_weak_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
            Extension(pool),
            Extension(auth_state()),
            Some(request("Alice", "a@x.com", "alllowercase")),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
