//! # Interval Timer Module
//!
//! Non-blocking repeating interval timer for the cooperative control loop.
//!
//! The main loop polls [`IntervalTimer::is_expired`] every iteration instead
//! of sleeping for the whole interval, so link/session health checks and
//! broker traffic servicing keep running between publishes. Tick arithmetic
//! is wraparound-safe: ticks are a wrapping `u32` millisecond counter and
//! elapsed time is computed with `wrapping_sub`, so the timer keeps working
//! across counter overflow (~49.7 days).

use std::time::Instant;

/// Source of monotonic millisecond ticks.
///
/// Abstracted so tests can drive the timer with a fake counter, including
/// across the `u32` wraparound boundary.
pub trait TickSource {
    /// Current tick in milliseconds. Wraps at `u32::MAX`.
    fn now_ms(&self) -> u32;
}

impl<T: TickSource + ?Sized> TickSource for &T {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Production tick source backed by `std::time::Instant`.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for MonotonicClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the point: the timer only ever looks at tick
        // differences, which survive the wrap.
        self.origin.elapsed().as_millis() as u32
    }
}

/// Polled repeating interval timer.
///
/// State machine contract:
/// - [`start`](Self::start) records the current tick as the reference point,
///   only if the timer is not already started. A `last_tick` of exactly zero
///   is a valid reference point; "not started" is tracked by the explicit
///   `started` flag, never by a zero sentinel.
/// - [`is_expired`](Self::is_expired) reports true exactly once per elapsed
///   interval, then latches false until [`clear`](Self::clear) re-arms it.
/// - [`clear`](Self::clear) resets the reference point to "now". Clearing an
///   already-cleared timer is a no-op beyond refreshing the reference point.
///
/// Never blocks; never allocates.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntervalTimer {
    last_tick: u32,
    started: bool,
    fired: bool,
}

impl IntervalTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer at the current tick if it is not already running.
    pub fn start<T: TickSource>(&mut self, ticks: &T) {
        if !self.started {
            self.last_tick = ticks.now_ms();
            self.started = true;
            self.fired = false;
        }
    }

    /// Poll for interval expiry.
    ///
    /// Returns true on the first poll at or after `last_tick + interval_ms`,
    /// and false on every other poll: before expiry, after the expiry has
    /// been reported (until `clear`), and while the timer is not started.
    pub fn is_expired<T: TickSource>(&mut self, ticks: &T, interval_ms: u32) -> bool {
        if !self.started || self.fired {
            return false;
        }
        let elapsed = ticks.now_ms().wrapping_sub(self.last_tick);
        if elapsed >= interval_ms {
            self.fired = true;
            true
        } else {
            false
        }
    }

    /// Re-arm for the next interval, measured from "now".
    pub fn clear<T: TickSource>(&mut self, ticks: &T) {
        self.last_tick = ticks.now_ms();
        self.started = true;
        self.fired = false;
    }

    /// Whether `start` has been called.
    pub fn is_started(&self) -> bool {
        self.started
    }
}
