//! catapult-scheduler — the background event loop.
//!
//! Runs a single user-supplied callback on a fixed interval in its own
//! Tokio task, separate from request handling, until told to stop.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── shutdown: watch::Sender<bool>          (cancellation signal)
//!   ├── handle:   JoinHandle<()>               (completion signal)
//!   ├── state:    watch::Sender<SchedulerState> (published snapshots)
//!   └── background task
//!       └── loop { sleep(interval) | shutdown → callback() → record }
//! ```
//!
//! # Lifecycle
//!
//! `Created → Running → StopRequested → Stopped`. A disabled scheduler
//! stays `Created` forever. Stopping is cooperative: an in-flight callback
//! always completes, only the next iteration is cancelled.

pub mod error;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{
    CallbackFuture, Scheduler, SchedulerPhase, SchedulerState, StateCheckCallback, callback,
};
