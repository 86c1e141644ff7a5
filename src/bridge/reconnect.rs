//! Reconnect bookkeeping: exponential backoff with a hard attempt ceiling.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(2000),
            max_attempts: 5,
        }
    }
}

/// Counts consecutive unsuccessful closes.
///
/// The counter only goes back to zero on a successful open or an explicit
/// reset, and never exceeds `max_attempts`.
#[derive(Debug, Clone)]
pub struct ReconnectTracker {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl ReconnectTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    /// Explicit user reconnect.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Record a close. Returns the delay before the next attempt, or
    /// `None` once the ceiling is reached.
    ///
    /// Delay for attempt n (1-based) is `base * 2^(n-1)`.
    pub fn on_close(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        let factor = 1u32 << (self.attempts - 1).min(16);
        Some(self.policy.base.saturating_mul(factor))
    }
}
