//! The deferred task slot.
//!
//! A [`TimeBank`] holds at most one pending task. Arming a task spawns one
//! background wait on the bound tokio runtime that races the countdown
//! against a oneshot cancellation signal. The callback runs exactly once,
//! with `false` on natural expiry and `true` on cancellation.
//!
//! The expiry/cancellation race is decided under the slot lock: when the
//! sleep elapses the wait re-checks the shared state before reporting, so a
//! task cancelled or extended in the meantime never reports a stale expiry.
//!
//! A wait dropped before it settles, because its runtime shut down, still
//! runs its callback with `true` and releases the slot.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::DEFAULT_TIMEOUT;
use crate::config::TimeBankConfig;
use crate::countdown::Countdown;
use crate::error::{Error, Result};
use crate::outcome::{SlotStatus, TaskOutcome};

/// Boxed task callback. The argument is `was_cancelled`.
pub type TaskCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// What a background wait should do once its sleep elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    /// Report natural expiry.
    Fired,
    /// The task was cancelled or superseded.
    Cancelled,
    /// The due time moved later; sleep again until it.
    Rearm(Instant),
}

/// State shared between the slot and its background wait.
#[derive(Debug)]
struct SlotState {
    running: bool,
    generation: u64,
    countdown: Countdown,
    cancel: Option<oneshot::Sender<()>>,
}

impl SlotState {
    const fn new() -> Self {
        Self {
            running: false,
            generation: 0,
            countdown: Countdown::dormant(DEFAULT_TIMEOUT),
            cancel: None,
        }
    }

    /// Stop the countdown and signal the pending wait, if any.
    ///
    /// Returns the generation that was cancelled.
    fn cancel_pending(&mut self) -> Option<u64> {
        if !self.running {
            return None;
        }

        self.running = false;
        self.countdown.stop();
        if let Some(cancel) = self.cancel.take() {
            // The receiver is gone only if the wait already settled.
            let _ = cancel.send(());
        }

        Some(self.generation)
    }

    /// Arm a new task generation. The caller must have cancelled first.
    fn arm(&mut self, due_at: Instant, now: Instant) -> (u64, oneshot::Receiver<()>) {
        let (cancel_tx, cancel_rx) = oneshot::channel();

        self.generation = self.generation.wrapping_add(1);
        self.countdown.arm_until(due_at, now);
        self.cancel = Some(cancel_tx);
        self.running = true;

        (self.generation, cancel_rx)
    }

    /// Decide the outcome of `generation` after its sleep elapsed at `now`.
    fn settle(&mut self, generation: u64, now: Instant) -> Settlement {
        if !self.running || self.generation != generation {
            return Settlement::Cancelled;
        }

        match self.countdown.due_at() {
            Some(due_at) if due_at > now => Settlement::Rearm(due_at),
            _ => {
                self.release();
                Settlement::Fired
            }
        }
    }

    /// Release the slot if `generation` is still the armed task.
    ///
    /// Used when a wait is dropped before it could settle.
    fn abandon(&mut self, generation: u64) -> bool {
        if !self.running || self.generation != generation {
            return false;
        }
        self.release();
        true
    }

    fn release(&mut self) {
        self.running = false;
        self.countdown.stop();
        self.cancel = None;
    }

    fn status(&self) -> SlotStatus {
        match self.countdown.due_at() {
            Some(due_at) if self.running => SlotStatus::Armed { due_at },
            _ => SlotStatus::Idle,
        }
    }
}

/// A single reusable slot for one deferred task.
///
/// The slot is `Send + Sync`; every operation takes `&self` and serializes
/// on an internal lock. Callbacks are never invoked while that lock is held,
/// so a callback may schedule, extend or cancel on the same slot.
///
/// Dropping the slot does not cancel an outstanding task. The task keeps
/// running and fires when its countdown elapses.
#[derive(Debug)]
pub struct TimeBank {
    config: TimeBankConfig,
    handle: Handle,
    state: Arc<Mutex<SlotState>>,
}

impl TimeBank {
    /// Create a slot bound to the current tokio runtime with default config.
    ///
    /// # Errors
    ///
    /// Returns `Error::RuntimeUnavailable` when called outside a tokio runtime.
    pub fn new() -> Result<Self> {
        Self::with_config(TimeBankConfig::default())
    }

    /// Create a slot bound to the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Error::RuntimeUnavailable` when called outside a tokio runtime.
    pub fn with_config(config: TimeBankConfig) -> Result<Self> {
        let handle =
            Handle::try_current().map_err(|e| Error::runtime_unavailable(e.to_string()))?;
        Ok(Self::with_handle(handle, config))
    }

    /// Create a slot that spawns its background waits on `handle`.
    #[must_use]
    pub fn with_handle(handle: Handle, config: TimeBankConfig) -> Self {
        Self {
            config,
            handle,
            state: Arc::new(Mutex::new(SlotState::new())),
        }
    }

    /// Get the slot configuration.
    #[must_use]
    pub const fn config(&self) -> &TimeBankConfig {
        &self.config
    }

    /// Schedule `callback` to run after `duration`, replacing any pending task.
    ///
    /// A pending task is cancelled first and its callback receives `true`.
    ///
    /// A zero `duration` runs `callback(false)` synchronously on the calling
    /// thread before this method returns. Every other delay runs the callback
    /// later on the slot's runtime.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` if `duration` cannot be added to the
    /// current instant, and `Error::RuntimeUnavailable` if the slot's runtime
    /// has shut down. The pending task is left untouched in both cases.
    pub fn schedule<F>(&self, duration: Duration, callback: F) -> Result<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.schedule_callback(duration, Some(Box::new(callback)))
    }

    /// Schedule an optional boxed callback. See [`TimeBank::schedule`].
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` if `callback` is `None` or if
    /// `duration` cannot be added to the current instant, and
    /// `Error::RuntimeUnavailable` if the slot's runtime has shut down. The
    /// pending task is left untouched in both cases.
    pub fn schedule_callback(
        &self,
        duration: Duration,
        callback: Option<TaskCallback>,
    ) -> Result<()> {
        let Some(callback) = callback else {
            warn!(slot = %self.config.label, "Rejected task without a callback");
            return Err(Error::InvalidParameters);
        };

        if duration.is_zero() {
            self.cancel();
            debug!(slot = %self.config.label, "Running zero-delay task immediately");
            callback(false);
            return Ok(());
        }

        let now = Instant::now();
        let Some(due_at) = now.checked_add(duration) else {
            warn!(
                slot = %self.config.label,
                delay = ?duration,
                "Rejected task with unrepresentable delay"
            );
            return Err(Error::InvalidParameters);
        };

        if !accepts_tasks(&self.handle) {
            warn!(slot = %self.config.label, "Rejected task on a runtime that has shut down");
            return Err(Error::runtime_unavailable("runtime has shut down"));
        }

        let (generation, cancel_rx) = {
            let mut state = self.state.lock();
            if let Some(superseded) = state.cancel_pending() {
                debug!(
                    slot = %self.config.label,
                    generation = superseded,
                    "Superseded pending task"
                );
            }
            state.arm(due_at, now)
        };

        debug!(
            slot = %self.config.label,
            generation,
            delay = ?duration,
            "Armed task"
        );

        let wait = BackgroundWait {
            label: self.config.label.clone(),
            state: Arc::clone(&self.state),
            generation,
            due_at,
            cancel_rx,
            callback: Some(callback),
        };
        drop(self.handle.spawn(wait.run()));

        Ok(())
    }

    /// Schedule `callback` to run at `deadline`.
    ///
    /// A deadline equal to the current instant takes the synchronous
    /// zero-delay path.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidDeadline` if `deadline` is already in the past.
    pub fn schedule_at_deadline<F>(&self, deadline: Instant, callback: F) -> Result<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let Some(duration) = deadline.checked_duration_since(Instant::now()) else {
            warn!(slot = %self.config.label, "Rejected deadline in the past");
            return Err(Error::InvalidDeadline);
        };

        self.schedule(duration, callback)
    }

    /// Schedule `callback` to run at a wall-clock deadline.
    ///
    /// The deadline is converted to a delay against `Utc::now()` once, so
    /// later wall-clock adjustments do not move the task.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidDeadline` if `deadline` is already in the past.
    pub fn schedule_at<F>(&self, deadline: DateTime<Utc>, callback: F) -> Result<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let Ok(duration) = deadline.signed_duration_since(Utc::now()).to_std() else {
            warn!(
                slot = %self.config.label,
                deadline = %deadline,
                "Rejected wall-clock deadline in the past"
            );
            return Err(Error::InvalidDeadline);
        };

        self.schedule(duration, callback)
    }

    /// Schedule a task and receive its outcome over a oneshot channel.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` if `duration` cannot be added to the
    /// current instant.
    pub fn schedule_outcome(
        &self,
        duration: Duration,
    ) -> Result<oneshot::Receiver<TaskOutcome>> {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        self.schedule(duration, move |was_cancelled| {
            let _ = outcome_tx.send(TaskOutcome::from_cancelled(was_cancelled));
        })?;
        Ok(outcome_rx)
    }

    /// Cancel the pending task, if any.
    ///
    /// The cancelled task's callback receives `true` on the slot's runtime.
    /// Calling this on an idle slot does nothing.
    pub fn cancel(&self) {
        let cancelled = self.state.lock().cancel_pending();
        if let Some(generation) = cancelled {
            debug!(slot = %self.config.label, generation, "Cancelled pending task");
        }
    }

    /// Push the pending task's due time back by `duration`.
    ///
    /// Returns `false` without effect if no task is running, if its due time
    /// has already passed, or if the new due time cannot be represented.
    pub fn extend(&self, duration: Duration) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();

        if !state.running || state.countdown.is_overdue(now) {
            return false;
        }
        let Some(due_at) = state.countdown.due_at() else {
            return false;
        };
        let Some(extended) = due_at.checked_add(duration) else {
            warn!(
                slot = %self.config.label,
                generation = state.generation,
                extension = ?duration,
                "Rejected unrepresentable extension"
            );
            return false;
        };

        state.countdown.arm_until(extended, now);
        debug!(
            slot = %self.config.label,
            generation = state.generation,
            remaining = ?state.countdown.period(),
            "Extended pending task"
        );

        true
    }

    /// Check if a task is armed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// When the armed task is due, or `None` when idle.
    #[must_use]
    pub fn due_at(&self) -> Option<Instant> {
        match self.status() {
            SlotStatus::Armed { due_at } => Some(due_at),
            SlotStatus::Idle => None,
        }
    }

    /// Time left until the armed task is due, or `None` when idle.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        let state = self.state.lock();
        if !state.running {
            return None;
        }
        state.countdown.remaining(Instant::now())
    }

    /// Get the slot status.
    #[must_use]
    pub fn status(&self) -> SlotStatus {
        self.state.lock().status()
    }
}

/// Whether `handle` still runs spawned tasks.
///
/// A runtime that has shut down completes every new task on the spot without
/// polling it, so a task that never finishes on its own reads as finished.
fn accepts_tasks(handle: &Handle) -> bool {
    let liveness = handle.spawn(std::future::pending::<()>());
    let open = !liveness.is_finished();
    liveness.abort();
    open
}

/// The background half of one armed task.
///
/// The slot-scoped [`Countdown`] carries the due time from task to task.
/// Each wait owns a fresh `Sleep` and resets it in place when the task is
/// extended.
///
/// The callback stays in the wait until it settles. Dropping an unsettled
/// wait reports cancellation.
struct BackgroundWait {
    label: String,
    state: Arc<Mutex<SlotState>>,
    generation: u64,
    due_at: Instant,
    cancel_rx: oneshot::Receiver<()>,
    callback: Option<TaskCallback>,
}

impl BackgroundWait {
    async fn run(mut self) {
        let sleep = tokio::time::sleep_until(self.due_at);
        tokio::pin!(sleep);
        let mut cancel_open = true;

        let outcome = loop {
            tokio::select! {
                biased;

                signal = &mut self.cancel_rx, if cancel_open => match signal {
                    Ok(()) => break TaskOutcome::Cancelled,
                    // Slot state dropped the sender without signalling; only expiry remains.
                    Err(_) => cancel_open = false,
                },
                () = &mut sleep => {
                    let settlement = self.state.lock().settle(self.generation, Instant::now());
                    match settlement {
                        Settlement::Fired => break TaskOutcome::Fired,
                        Settlement::Cancelled => break TaskOutcome::Cancelled,
                        Settlement::Rearm(next) => {
                            debug!(
                                slot = %self.label,
                                generation = self.generation,
                                "Re-arming extended task"
                            );
                            sleep.as_mut().reset(next);
                        }
                    }
                }
            }
        };

        debug!(
            slot = %self.label,
            generation = self.generation,
            outcome = %outcome,
            "Task settled"
        );
        if let Some(callback) = self.callback.take() {
            callback(outcome.was_cancelled());
        }
    }
}

impl Drop for BackgroundWait {
    fn drop(&mut self) {
        let Some(callback) = self.callback.take() else {
            return;
        };

        let released = self.state.lock().abandon(self.generation);
        debug!(
            slot = %self.label,
            generation = self.generation,
            released,
            "Wait dropped before settling"
        );
        callback(true);
    }
}
