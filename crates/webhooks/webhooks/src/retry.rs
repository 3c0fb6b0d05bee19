//! Retry strategies and the delivery deadline.
//!
//! Both retry layers of the sender draw their delays from a
//! [`RetryStrategy`]: the transport layer (status-triggered, inside one
//! `send`) uses [`ExponentialBackoff`], the caller-visible loop of
//! `send_with_retry` uses [`LinearBackoff`]. A [`Deadline`] caps the total
//! wall-clock time of one logical delivery across both layers.

use std::time::Duration;

use tokio::time::Instant;

/// Trait for retry strategies.
pub trait RetryStrategy: Send + Sync {
    /// Returns the delay before retry number `attempt` (0-based), or None if
    /// max retries exceeded.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Returns the maximum number of attempts.
    fn max_attempts(&self) -> u32;
}

/// Exponential backoff retry strategy.
///
/// Delay increases exponentially: base * 2^attempt
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Base delay.
    pub base: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Maximum number of attempts.
    pub max_attempts: u32,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff strategy.
    pub fn new() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(120),
            max_attempts: 3,
        }
    }

    /// Sets the base delay.
    pub fn base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Sets the maximum delay.
    pub fn max_delay(mut self, max: Duration) -> Self {
        self.max_delay = max;
        self
    }

    /// Sets the maximum attempts.
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let multiplier = 2_u32.saturating_pow(attempt);
        let delay = self.base.saturating_mul(multiplier);
        Some(std::cmp::min(delay, self.max_delay))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Linear backoff retry strategy.
///
/// Delay increases linearly: base * (attempt + 1)
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    /// Base delay.
    pub base: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Maximum number of attempts.
    pub max_attempts: u32,
}

impl LinearBackoff {
    /// Creates a new linear backoff strategy.
    pub fn new() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: 3,
        }
    }

    /// Sets the base delay.
    pub fn base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Sets the maximum delay.
    pub fn max_delay(mut self, max: Duration) -> Self {
        self.max_delay = max;
        self
    }

    /// Sets the maximum attempts.
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryStrategy for LinearBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let delay = self.base.saturating_mul(attempt + 1);
        Some(std::cmp::min(delay, self.max_delay))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Upper bound on the wall-clock time of one logical delivery.
///
/// A retry is only scheduled if waiting for it keeps the delivery inside
/// the limit. The limit does not interrupt a request already in flight;
/// that is bounded by the client timeout.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    /// Starts a deadline that expires `limit` from now.
    pub fn after(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit: Some(limit),
        }
    }

    /// Starts a deadline that never expires.
    pub fn unbounded() -> Self {
        Self {
            start: Instant::now(),
            limit: None,
        }
    }

    /// Time since the deadline was started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left, or None if unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.limit.map(|limit| limit.saturating_sub(self.elapsed()))
    }

    /// Checks whether waiting `delay` before another attempt stays inside the limit.
    pub fn allows(&self, delay: Duration) -> bool {
        match self.remaining() {
            Some(remaining) => delay < remaining,
            None => true,
        }
    }
}
