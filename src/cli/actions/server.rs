use crate::api;
use anyhow::Result;
use secrecy::SecretString;

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub session_secret: SecretString,
    pub frontend_base_url: String,
    pub token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub lockout_max_attempts: i32,
    pub lockout_minutes: i64,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_seconds: u64,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &self.dsn)
            .field("session_secret", &"***")
            .field("frontend_base_url", &self.frontend_base_url)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("lockout_max_attempts", &self.lockout_max_attempts)
            .field("lockout_minutes", &self.lockout_minutes)
            .field("rate_limit_max_requests", &self.rate_limit_max_requests)
            .field(
                "rate_limit_window_seconds",
                &self.rate_limit_window_seconds,
            )
            .finish()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = api::handlers::auth::AuthConfig::new(args.frontend_base_url)
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_lockout_max_attempts(args.lockout_max_attempts)
        .with_lockout_minutes(args.lockout_minutes)
        .with_rate_limit_max_requests(args.rate_limit_max_requests)
        .with_rate_limit_window_seconds(args.rate_limit_window_seconds);

    api::new(args.port, args.dsn, auth_config, &args.session_secret).await
}
