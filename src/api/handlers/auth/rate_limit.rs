//! Rate limiting primitives for auth flows.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    PasswordResetRequest,
}

impl RateLimitAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::PasswordResetRequest => "password_reset_request",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

struct Bucket {
    count: u32,
    window_start: Instant,
}

/// Fixed-window counter keyed by (client, action).
///
/// Exactly `max_requests` calls per key succeed within a window; further
/// calls are rejected until the window rolls over. The check and increment
/// happen under one lock, so concurrent requests from the same client
/// cannot slip past the limit.
pub struct FixedWindowRateLimiter {
    max_requests: u32,
    window: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

// Requests without a resolvable client ip share one bucket rather than
// bypassing the limiter.
const UNKNOWN_CLIENT: &str = "unknown";

const MAX_TRACKED_BUCKETS: usize = 4096;

impl FixedWindowRateLimiter {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn key(ip: Option<&str>, action: RateLimitAction) -> String {
        format!("{}:{}", ip.unwrap_or(UNKNOWN_CLIENT), action.as_str())
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision {
        let now = Instant::now();
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Drop stale entries before they pile up.
        if buckets.len() >= MAX_TRACKED_BUCKETS {
            let window = self.window;
            buckets.retain(|_, bucket| now.duration_since(bucket.window_start) < window);
        }

        let bucket = buckets.entry(Self::key(ip, action)).or_insert(Bucket {
            count: 0,
            window_start: now,
        });

        if now.duration_since(bucket.window_start) >= self.window {
            bucket.count = 0;
            bucket.window_start = now;
        }

        if bucket.count >= self.max_requests {
            return RateLimitDecision::Limited;
        }
        bucket.count += 1;
        RateLimitDecision::Allowed
    }
}
