//! Authenticated profile read/update and password change.

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

use super::auth::session;
use super::auth::storage;
use super::auth::tokens::{self, TokenKind};
use super::auth::types::{
    ChangePasswordRequest, MessageResponse, ProfileResponse, UpdateProfileRequest,
    UpdateProfileResponse,
};
use super::auth::utils::{build_email_change_url, valid_email, valid_password};
use super::auth::{password, AuthState};

const NOT_AUTHENTICATED: &str = "Not authenticated";
const PROFILE_NOT_FOUND: &str = "Profile not found";
const EMAIL_TAKEN: &str = "An account with this email already exists";
const WEAK_PASSWORD: &str = "Password must be at least 8 characters and include \
     lowercase, uppercase, a digit, and a symbol (@$!%*?&)";

/// Return the authenticated account's profile.
#[utoipa::path(
    get,
    path = "/v1/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Account no longer exists")
    ),
    tag = "profile"
)]
pub async fn get_profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, ApiError> {
    let (account_id, claims) = session::require_claims(&headers, &auth_state)?;

    // Valid credential but the row is gone: 404, not 401.
    let Some(account) = storage::lookup_account_by_id(&pool, account_id).await? else {
        return Err(ApiError::NotFound(PROFILE_NOT_FOUND.to_string()));
    };
    if claims.token_version != account.token_version {
        return Err(ApiError::Authentication(NOT_AUTHENTICATED.to_string()));
    }

    Ok((
        StatusCode::OK,
        Json(ProfileResponse {
            name: account.name,
            email: account.email,
            email_verified: account.email_verified_at.is_some(),
        }),
    )
        .into_response())
}

/// Update the profile name and/or start an email change.
///
/// A changed email does not take effect here: a confirmation token is
/// mailed to the new address and the stored email stays untouched until
/// that token is redeemed.
#[utoipa::path(
    put,
    path = "/v1/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UpdateProfileResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "New email already registered")
    ),
    tag = "profile"
)]
pub async fn update_profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<UpdateProfileRequest>>,
) -> Result<Response, ApiError> {
    let account = session::authenticate(&headers, &pool, &auth_state).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    if let Some(name) = request.name.as_deref() {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("Name cannot be empty".to_string()));
        }
        if name != account.name {
            storage::update_name(&pool, account.id, name).await?;
        }
    }

    let mut email_change_pending = false;
    if let Some(new_email) = request.email.as_deref() {
        let new_email = new_email.trim();
        if new_email != account.email {
            if !valid_email(new_email) {
                return Err(ApiError::Validation("Invalid email".to_string()));
            }
            // Pre-check for a friendlier 409; redemption re-checks under
            // the unique constraint.
            if storage::lookup_account_by_email(&pool, new_email)
                .await?
                .is_some()
            {
                return Err(ApiError::Conflict(EMAIL_TAKEN.to_string()));
            }

            let token = tokens::issue_token(
                &pool.0,
                TokenKind::EmailChange,
                account.id,
                Some(new_email),
                auth_state.config(),
            )
            .await?;

            let link = build_email_change_url(auth_state.config().frontend_base_url(), &token);
            send_best_effort(
                auth_state.mailer(),
                &EmailMessage::with_link(new_email, "confirm_email_change", &link),
            );
            email_change_pending = true;
        }
    }

    let message = if email_change_pending {
        "Profile updated. Check your new email address to confirm the change.".to_string()
    } else {
        "Profile updated.".to_string()
    };

    Ok((
        StatusCode::OK,
        Json(UpdateProfileResponse {
            message,
            email_change_pending,
        }),
    )
        .into_response())
}

/// Change the password of the authenticated account.
///
/// Success increments the credential epoch, so the session used for this
/// request (and every other outstanding session) stops validating.
#[utoipa::path(
    put,
    path = "/v1/profile/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Weak new password"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Current password incorrect")
    ),
    tag = "profile"
)]
pub async fn change_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Result<Response, ApiError> {
    let account = session::authenticate(&headers, &pool, &auth_state).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    if !password::verify_secret(&request.current_password, &account.password_hash) {
        return Err(ApiError::Authorization(
            "Current password is incorrect".to_string(),
        ));
    }
    if !valid_password(&request.new_password) {
        return Err(ApiError::Validation(WEAK_PASSWORD.to_string()));
    }

    let password_hash = password::hash_secret(&request.new_password)?;
    storage::update_password(&pool.0, account.id, &password_hash).await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password changed. Please log in again.".to_string(),
        }),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::super::auth::test_support::auth_state;
    use super::*;
    use anyhow::Result;
    use axum::http::HeaderValue;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn get_profile_without_session_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = get_profile(HeaderMap::new(), Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn update_profile_without_session_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = update_profile(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn change_password_without_session_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = change_password(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn get_profile_with_garbage_token_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer not-a-session"),
        );
        let response = get_profile(headers, Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
