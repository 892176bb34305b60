//! Login: credential verification, lockout enforcement, session issuance.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

use crate::api::error::ApiError;

use super::lockout::{FailureUpdate, LockoutPolicy, LockoutStatus};
use super::password;
use super::session;
use super::state::AuthState;
use super::storage;
use super::types::{LoginRequest, LoginResponse};

/// Identical for unknown email and wrong password, so the endpoint does
/// not reveal whether an account exists.
const INVALID_CREDENTIALS: &str = "Invalid credentials";

fn locked_message(remaining_minutes: i64) -> String {
    format!("Account locked. Try again in {remaining_minutes} minute(s).")
}

/// Verify credentials and issue a session cookie.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account locked")
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::Validation("Missing email or password".to_string()));
    }

    let Some(account) = storage::lookup_account_by_email(&pool, email).await? else {
        // Same message as a wrong password; no enumeration.
        return Err(ApiError::Authentication(INVALID_CREDENTIALS.to_string()));
    };

    // Lockout is enforced before the password is even looked at.
    let policy = auth_state.config().lockout_policy();
    if let LockoutStatus::Locked { remaining_minutes } =
        LockoutPolicy::check(account.lockout_until, Utc::now())
    {
        return Err(ApiError::Authorization(locked_message(remaining_minutes)));
    }

    if !password::verify_secret(&request.password, &account.password_hash) {
        let update = policy.on_failure(account.failed_login_attempts);
        storage::record_failed_login(&pool, account.id, update, policy.lockout_duration()).await?;

        if matches!(update, FailureUpdate::Lock) {
            warn!(account_id = %account.id, "account locked after repeated failures");
            return Err(ApiError::Authorization(locked_message(
                policy.lockout_minutes,
            )));
        }
        return Err(ApiError::Authentication(INVALID_CREDENTIALS.to_string()));
    }

    // Success clears any residual counter or expired lockout.
    if account.failed_login_attempts > 0 || account.lockout_until.is_some() {
        storage::clear_login_failures(&pool, account.id).await?;
    }

    let token = session::issue_session(&auth_state, &account)?;
    let cookie = session::session_cookie(&auth_state, &token)
        .map_err(|err| ApiError::Internal(anyhow::Error::from(err)))?;

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            message: "Logged in".to_string(),
            token,
        }),
    )
        .into_response())
}
