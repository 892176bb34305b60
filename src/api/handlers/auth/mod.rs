//! Auth handlers and the credential/token lifecycle engine.
//!
//! ## Lockout
//!
//! Five consecutive failed logins lock the account for fifteen minutes and
//! reset the counter; the lockout check runs before any password work, so
//! a correct password during the window is still rejected.
//!
//! ## Secrets at rest
//!
//! Passwords and password-reset tokens are stored only as Argon2 digests.
//! Email-verification and email-change tokens are stored as presented;
//! they are 256-bit random values with a short TTL.
//!
//! ## Credential epoch
//!
//! Sessions embed the account's `token_version` at issuance. Any password
//! change increments it, which invalidates every outstanding session
//! without a revocation list.

mod lockout;
pub(crate) mod login;
pub(crate) mod password;
mod rate_limit;
pub(crate) mod register;
pub(crate) mod reset;
pub(crate) mod session;
mod state;
pub(crate) mod storage;
pub(crate) mod tokens;
pub(crate) mod types;
pub(crate) mod utils;
pub(crate) mod verification;

pub use rate_limit::{FixedWindowRateLimiter, NoopRateLimiter, RateLimiter};
pub use state::{AuthConfig, AuthState};
#[cfg(test)]
pub(crate) use state::test_support;
