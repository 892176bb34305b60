//! Account lockout policy.
//!
//! Failed logins increment a per-account counter; reaching the threshold
//! locks the account for a fixed duration and resets the counter to zero,
//! so a fresh grace window starts once the lockout expires. The counter
//! and `lockout_until` are never both in effect.

use chrono::{DateTime, Duration, Utc};

#[derive(Clone, Copy, Debug)]
pub struct LockoutPolicy {
    pub max_attempts: i32,
    pub lockout_minutes: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LockoutStatus {
    Unlocked,
    Locked { remaining_minutes: i64 },
}

/// Outcome of a failed login, applied by storage as a single UPDATE.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FailureUpdate {
    /// Persist the incremented counter.
    Increment(i32),
    /// Threshold reached: set `lockout_until` and zero the counter.
    Lock,
}

impl LockoutPolicy {
    /// Whether the account is currently locked.
    ///
    /// Checked strictly before password comparison, so a correct password
    /// during lockout is still rejected.
    pub(crate) fn check(lockout_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> LockoutStatus {
        match lockout_until {
            Some(until) if now < until => LockoutStatus::Locked {
                remaining_minutes: remaining_minutes(until, now),
            },
            _ => LockoutStatus::Unlocked,
        }
    }

    /// Decide what a failed attempt does given the current counter.
    pub(crate) fn on_failure(&self, failed_attempts: i32) -> FailureUpdate {
        if failed_attempts + 1 >= self.max_attempts {
            FailureUpdate::Lock
        } else {
            FailureUpdate::Increment(failed_attempts + 1)
        }
    }

    pub(crate) fn lockout_duration(&self) -> Duration {
        Duration::minutes(self.lockout_minutes)
    }
}

/// Minutes until the lockout expires, rounded up.
pub(crate) fn remaining_minutes(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (until - now).num_seconds().max(0);
    (seconds + 59) / 60
}
