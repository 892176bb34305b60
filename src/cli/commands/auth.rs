use anyhow::{Context, Result};
use clap::{Arg, Command};

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_lockout_args(command);
    with_rate_limit_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL used for verification and reset links")
                .env("PORTERO_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new("token-ttl-seconds")
                .long("token-ttl-seconds")
                .help("Verification/reset/email-change token TTL in seconds")
                .env("PORTERO_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Session credential TTL in seconds")
                .env("PORTERO_SESSION_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_lockout_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("lockout-max-attempts")
                .long("lockout-max-attempts")
                .help("Failed logins before an account is locked")
                .env("PORTERO_LOCKOUT_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(i32)),
        )
        .arg(
            Arg::new("lockout-minutes")
                .long("lockout-minutes")
                .help("How long a locked account stays locked")
                .env("PORTERO_LOCKOUT_MINUTES")
                .default_value("15")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_rate_limit_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("rate-limit-max-requests")
                .long("rate-limit-max-requests")
                .help("Requests allowed per client per window for sensitive endpoints")
                .env("PORTERO_RATE_LIMIT_MAX_REQUESTS")
                .default_value("3")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("rate-limit-window-seconds")
                .long("rate-limit-window-seconds")
                .help("Fixed window length for the rate limiter")
                .env("PORTERO_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub lockout_max_attempts: i32,
    pub lockout_minutes: i64,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_seconds: u64,
}

impl Options {
    /// Collect auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is somehow missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .context("missing argument: --frontend-base-url")?,
            token_ttl_seconds: matches
                .get_one::<i64>("token-ttl-seconds")
                .copied()
                .context("missing argument: --token-ttl-seconds")?,
            session_ttl_seconds: matches
                .get_one::<i64>("session-ttl-seconds")
                .copied()
                .context("missing argument: --session-ttl-seconds")?,
            lockout_max_attempts: matches
                .get_one::<i32>("lockout-max-attempts")
                .copied()
                .context("missing argument: --lockout-max-attempts")?,
            lockout_minutes: matches
                .get_one::<i64>("lockout-minutes")
                .copied()
                .context("missing argument: --lockout-minutes")?,
            rate_limit_max_requests: matches
                .get_one::<u32>("rate-limit-max-requests")
                .copied()
                .context("missing argument: --rate-limit-max-requests")?,
            rate_limit_window_seconds: matches
                .get_one::<u64>("rate-limit-window-seconds")
                .copied()
                .context("missing argument: --rate-limit-window-seconds")?,
        })
    }
}
