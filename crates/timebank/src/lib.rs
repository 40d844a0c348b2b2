//! # TimeBank
//!
//! A single-slot deferred task: schedule one callback to run after a delay or
//! at a deadline, then cancel, extend, or replace it before it fires.
//!
//! Every armed task invokes its callback exactly once, with `false` when the
//! countdown elapses and `true` when the task is cancelled or superseded.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --schedule(d > 0)--> Armed --countdown elapses--> Fired     --> Idle
//!                             |  \--cancel / schedule--> Cancelled --> Idle
//!                             \--extend(e)--> Armed (due time pushed back)
//! Idle --schedule(0)--> Fired (synchronously, on the caller) --> Idle
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use timebank::{TaskOutcome, TimeBank};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bank = TimeBank::new()?;
//!
//! let outcome = bank.schedule_outcome(Duration::from_millis(20))?;
//! assert!(bank.extend(Duration::from_millis(10)));
//! assert_eq!(outcome.await?, TaskOutcome::Fired);
//!
//! let outcome = bank.schedule_outcome(Duration::from_secs(60))?;
//! bank.cancel();
//! assert_eq!(outcome.await?, TaskOutcome::Cancelled);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::time::Duration;

mod config;
mod countdown;
mod error;
mod outcome;
mod slot;

pub use config::TimeBankConfig;
pub use error::{Error, Result};
pub use outcome::{SlotStatus, TaskOutcome};
pub use slot::{TaskCallback, TimeBank};

/// Dormant countdown value held before any task is armed.
///
/// Every armed task overwrites it, so it never affects when a task fires.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default label attached to log events.
pub const DEFAULT_LABEL: &str = "timebank";
