//! OpenAPI document, served at `/openapi.json`.

use axum::{response::IntoResponse, Json};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa::OpenApi;

use super::handlers::{auth, health, profile};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register::register,
        auth::login::login,
        auth::reset::request_password_reset,
        auth::reset::reset_password,
        auth::verification::verify_email,
        auth::verification::verify_new_email,
        profile::get_profile,
        profile::update_profile,
        profile::change_password,
    ),
    components(schemas(
        health::Health,
        auth::types::RegisterRequest,
        auth::types::MessageResponse,
        auth::types::LoginRequest,
        auth::types::LoginResponse,
        auth::types::RequestPasswordResetRequest,
        auth::types::ResetPasswordRequest,
        auth::types::VerifyTokenQuery,
        auth::types::ProfileResponse,
        auth::types::UpdateProfileRequest,
        auth::types::UpdateProfileResponse,
        auth::types::ChangePasswordRequest,
    ))
)]
struct ApiDoc;

/// Full document with Cargo.toml metadata and tag descriptions applied.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();

    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    info.contact = cargo_contact();
    info.license = cargo_license();

    let mut auth_tag = Tag::new("auth");
    auth_tag.description =
        Some("Registration, login, verification, and password reset".to_string());
    let mut profile_tag = Tag::new("profile");
    profile_tag.description = Some("Authenticated account management".to_string());
    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service health".to_string());

    let built = OpenApiBuilder::new()
        .info(info)
        .tags(Some(vec![auth_tag, profile_tag, health_tag]))
        .build();
    spec.info = built.info;
    spec.tags = built.tags;
    spec
}

/// Serve the document as JSON.
pub async fn serve() -> impl IntoResponse {
    Json(openapi())
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Portero"));
            assert_eq!(contact.email.as_deref(), Some("team@portero.dev"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
        assert!(tags.iter().any(|tag| tag.name == "profile"));

        assert!(spec.paths.paths.contains_key("/v1/auth/register"));
        assert!(spec.paths.paths.contains_key("/v1/auth/login"));
        assert!(spec
            .paths
            .paths
            .contains_key("/v1/auth/request-password-reset"));
        assert!(spec.paths.paths.contains_key("/v1/auth/reset-password"));
        assert!(spec.paths.paths.contains_key("/v1/auth/verify"));
        assert!(spec.paths.paths.contains_key("/v1/auth/verify-new-email"));
        assert!(spec.paths.paths.contains_key("/v1/profile"));
        assert!(spec
            .paths
            .paths
            .contains_key("/v1/profile/change-password"));
        assert!(spec.paths.paths.contains_key("/health"));
    }
}
