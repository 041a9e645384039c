// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use std::time::{Duration, Instant};

/// Exponential backoff bookkeeping for login and fetch attempts.
///
/// Nothing here sleeps: the coordinator asks [`Backoff::ready`] before each
/// attempt and records the outcome afterwards. The n-th consecutive failure
/// closes the window for `base * 2^min(n-1, 4)`, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
    next_attempt: Option<Instant>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
            next_attempt: None,
        }
    }

    /// Delay that follows the given number of consecutive failures.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32 << (failures - 1).min(4);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Record a failure at `now`. Returns the delay before the next attempt.
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = self.delay_for(self.failures);
        self.next_attempt = Some(now + delay);
        delay
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.next_attempt = None;
    }

    /// Whether an attempt is allowed at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        self.next_attempt.is_none_or(|at| now >= at)
    }

    /// Time left before the next attempt is allowed.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_attempt
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
