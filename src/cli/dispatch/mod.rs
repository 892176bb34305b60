//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let session_secret = matches
        .get_one::<String>("session-secret")
        .cloned()
        .context("missing required argument: --session-secret")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        session_secret: SecretString::from(session_secret),
        frontend_base_url: auth_opts.frontend_base_url,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        lockout_max_attempts: auth_opts.lockout_max_attempts,
        lockout_minutes: auth_opts.lockout_minutes,
        rate_limit_max_requests: auth_opts.rate_limit_max_requests,
        rate_limit_window_seconds: auth_opts.rate_limit_window_seconds,
    }))
}
