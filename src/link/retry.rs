//! Reconnect retry policies
//!
//! The inherited behavior — and the default — is a fixed delay with no
//! backoff and no attempt limit: the surrounding deployment assumes the
//! access point and broker always come back eventually, and the agent has
//! nothing useful to do until they are. This is a known liability (the
//! process blocks for the whole outage); it is kept deliberately, expressed
//! as a policy trait so tests and cautious deployments can bound it.

use std::time::Duration;

/// Pacing and budget for a reconnect loop.
pub trait RetryPolicy: Send {
    /// Delay between attempts.
    fn delay(&self) -> Duration;

    /// Maximum number of attempts; `None` means retry forever.
    fn max_attempts(&self) -> Option<u32>;
}

/// Fixed delay, unbounded attempts (the default policy).
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay_ms: u64) -> Self {
        Self { delay: Duration::from_millis(delay_ms) }
    }
}

impl RetryPolicy for FixedDelay {
    fn delay(&self) -> Duration {
        self.delay
    }

    fn max_attempts(&self) -> Option<u32> {
        None
    }
}

/// Fixed delay with an attempt limit.
#[derive(Debug, Clone, Copy)]
pub struct Bounded {
    delay: Duration,
    attempts: u32,
}

impl Bounded {
    pub fn new(delay_ms: u64, attempts: u32) -> Self {
        Self { delay: Duration::from_millis(delay_ms), attempts }
    }
}

impl RetryPolicy for Bounded {
    fn delay(&self) -> Duration {
        self.delay
    }

    fn max_attempts(&self) -> Option<u32> {
        Some(self.attempts)
    }
}
