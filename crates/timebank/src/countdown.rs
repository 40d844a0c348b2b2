//! The reusable countdown owned by a slot.
//!
//! A countdown is created once, dormant, and then armed and stopped in place
//! for every task the slot runs. It never allocates.

use std::time::Duration;

use tokio::time::Instant;

/// A resettable countdown.
///
/// `period` is the span the countdown was last armed for (remaining time
/// plus extension after an extend). `due_at` is `None` while stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Countdown {
    period: Duration,
    due_at: Option<Instant>,
}

impl Countdown {
    /// Create a stopped countdown holding its dormant period.
    pub(crate) const fn dormant(period: Duration) -> Self {
        Self {
            period,
            due_at: None,
        }
    }

    /// Arm the countdown to expire at `due_at`.
    pub(crate) fn arm_until(&mut self, due_at: Instant, now: Instant) {
        self.period = due_at.saturating_duration_since(now);
        self.due_at = Some(due_at);
    }

    /// Stop the countdown. Returns whether it was armed.
    pub(crate) const fn stop(&mut self) -> bool {
        self.due_at.take().is_some()
    }

    pub(crate) const fn due_at(&self) -> Option<Instant> {
        self.due_at
    }

    pub(crate) const fn period(&self) -> Duration {
        self.period
    }

    /// Time left before expiry, zero once overdue.
    pub(crate) fn remaining(&self, now: Instant) -> Option<Duration> {
        self.due_at
            .map(|due_at| due_at.saturating_duration_since(now))
    }

    /// Whether the countdown is armed and its due time is strictly before `now`.
    pub(crate) fn is_overdue(&self, now: Instant) -> bool {
        self.due_at.is_some_and(|due_at| due_at < now)
    }
}
