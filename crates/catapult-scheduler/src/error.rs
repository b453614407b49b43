//! Scheduler error types.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the event loop's lifecycle operations.
///
/// Callback failures are never reported here; they are recorded in
/// `SchedulerState::last_error`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no tokio runtime available to spawn the event loop")]
    NoRuntime,

    #[error("event loop did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
