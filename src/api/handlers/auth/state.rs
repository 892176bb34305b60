//! Auth configuration and shared per-process state.

use jsonwebtoken::{DecodingKey, EncodingKey};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::api::email::EmailSender;

use super::lockout::LockoutPolicy;
use super::rate_limit::RateLimiter;

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_LOCKOUT_MAX_ATTEMPTS: i32 = 5;
const DEFAULT_LOCKOUT_MINUTES: i64 = 15;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 3;
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 15 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    token_ttl_seconds: i64,
    session_ttl_seconds: i64,
    lockout_max_attempts: i32,
    lockout_minutes: i64,
    rate_limit_max_requests: u32,
    rate_limit_window_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            lockout_max_attempts: DEFAULT_LOCKOUT_MAX_ATTEMPTS,
            lockout_minutes: DEFAULT_LOCKOUT_MINUTES,
            rate_limit_max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            rate_limit_window_seconds: DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_lockout_max_attempts(mut self, attempts: i32) -> Self {
        self.lockout_max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_lockout_minutes(mut self, minutes: i64) -> Self {
        self.lockout_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_rate_limit_max_requests(mut self, max_requests: u32) -> Self {
        self.rate_limit_max_requests = max_requests;
        self
    }

    #[must_use]
    pub fn with_rate_limit_window_seconds(mut self, seconds: u64) -> Self {
        self.rate_limit_window_seconds = seconds;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(crate) fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(crate) fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            max_attempts: self.lockout_max_attempts,
            lockout_minutes: self.lockout_minutes,
        }
    }

    #[must_use]
    pub fn rate_limit_max_requests(&self) -> u32 {
        self.rate_limit_max_requests
    }

    #[must_use]
    pub fn rate_limit_window_seconds(&self) -> u64 {
        self.rate_limit_window_seconds
    }

    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// HS256 key pair derived once from the configured session secret.
pub(crate) struct SessionKeys {
    pub(crate) encoding: EncodingKey,
    pub(crate) decoding: DecodingKey,
}

impl SessionKeys {
    fn from_secret(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }
}

pub struct AuthState {
    config: AuthConfig,
    session_keys: SessionKeys,
    rate_limiter: Arc<dyn RateLimiter>,
    mailer: Arc<dyn EmailSender>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        session_secret: &SecretString,
        rate_limiter: Arc<dyn RateLimiter>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            config,
            session_keys: SessionKeys::from_secret(session_secret),
            rate_limiter,
            mailer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn session_keys(&self) -> &SessionKeys {
        &self.session_keys
    }

    pub(crate) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    pub(crate) fn mailer(&self) -> &dyn EmailSender {
        self.mailer.as_ref()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://accounts.example.com".to_string());

        assert_eq!(config.frontend_base_url(), "https://accounts.example.com");
        assert_eq!(config.token_ttl_seconds(), DEFAULT_TOKEN_TTL_SECONDS);
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert_eq!(
            config.lockout_policy().max_attempts,
            DEFAULT_LOCKOUT_MAX_ATTEMPTS
        );
        assert_eq!(
            config.lockout_policy().lockout_minutes,
            DEFAULT_LOCKOUT_MINUTES
        );
        assert_eq!(
            config.rate_limit_max_requests(),
            DEFAULT_RATE_LIMIT_MAX_REQUESTS
        );
        assert_eq!(
            config.rate_limit_window_seconds(),
            DEFAULT_RATE_LIMIT_WINDOW_SECONDS
        );
        assert!(config.session_cookie_secure());

        let config = config
            .with_token_ttl_seconds(120)
            .with_session_ttl_seconds(300)
            .with_lockout_max_attempts(3)
            .with_lockout_minutes(5)
            .with_rate_limit_max_requests(10)
            .with_rate_limit_window_seconds(60);

        assert_eq!(config.token_ttl_seconds(), 120);
        assert_eq!(config.session_ttl_seconds(), 300);
        assert_eq!(config.lockout_policy().max_attempts, 3);
        assert_eq!(config.lockout_policy().lockout_minutes, 5);
        assert_eq!(config.rate_limit_max_requests(), 10);
        assert_eq!(config.rate_limit_window_seconds(), 60);
    }

    #[test]
    fn plain_http_frontend_disables_secure_cookie() {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        assert!(!config.session_cookie_secure());
    }
}
