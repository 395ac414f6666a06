//! # Clock & Timer Service
//!
//! A monotonic tick source plus one-shot, reschedulable, cancellable timers.
//! Mirrors the host collaborators `ctimer_set`/`ctimer_reset`/`ctimer_stop`,
//! `etimer_*`, and `clock_time()`, kept as plain data rather than real OS
//! timers: the host event loop owns the actual waiting and calls into this
//! crate's `on_*` entry points when a deadline is reached. No thread, no
//! lock — single-threaded cooperative, as the rest of the crate.

use quanta::{Clock as QuantaClock, Instant};
use std::time::Duration;

/// Source of monotonic time. A trait so tests can supply a synthetic clock
/// without depending on wall-clock timing.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Default clock backed by `quanta::Instant`.
#[derive(Clone, Default)]
pub struct MonotonicClock {
    inner: QuantaClock,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            inner: QuantaClock::new(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        self.inner.now()
    }
}

/// A single one-shot timer.
///
/// `set` arms it relative to `now`. `reset` (re-arming an already-armed
/// timer) simply replaces the pending deadline — there is no separate
/// "cancel, then re-arm" dance, matching `ctimer_reset` semantics. `stop`
/// disarms it. `fired` reports whether `now` has reached the deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm the timer to fire `delay` after `now`. Replaces any pending
    /// deadline.
    pub fn set(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    /// Alias for `set` — kept distinct to read like the reference's
    /// `ctimer_set` vs `ctimer_reset` call sites even though the behavior is
    /// identical for a one-shot timer.
    pub fn reset(&mut self, now: Instant, delay: Duration) {
        self.set(now, delay);
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Whether the timer's deadline has been reached as of `now`.
    pub fn fired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(d) if now >= d)
    }

    /// Time remaining until the deadline, or `None` if disarmed or already
    /// fired.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.and_then(|d| {
            if now >= d {
                None
            } else {
                Some(d.saturating_duration_since(now))
            }
        })
    }
}
