//! Scheduler — runs the state-check callback on a fixed interval.
//!
//! The `Scheduler` owns one background task. The task sleeps for the
//! configured interval, runs the callback, records the outcome, and
//! repeats until the shutdown signal fires. Callback errors and panics
//! are recorded in the published state and never end the loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{SchedulerError, SchedulerResult};

/// Future returned by a state-check callback.
pub type CallbackFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// Zero-argument callback invoked once per interval.
///
/// Returns `Err(detail)` on failure. The scheduler imposes no timeout on
/// it, so a callback that never completes stalls the loop.
pub type StateCheckCallback = Arc<dyn Fn() -> CallbackFuture + Send + Sync>;

/// Wrap an async closure as a `StateCheckCallback`.
pub fn callback<F, Fut>(f: F) -> StateCheckCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// Lifecycle phase of the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    /// Constructed but never spawned (the loop is disabled). Terminal.
    Created,
    /// Background task is sleeping or running the callback.
    Running,
    /// Stop was signalled; the task has not exited yet.
    StopRequested,
    /// Background task has exited. Terminal.
    Stopped,
}

/// Point-in-time snapshot of the event loop.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerState {
    #[serde(rename = "interval_ms", serialize_with = "serialize_millis")]
    pub interval: Duration,
    pub enabled: bool,
    pub running: bool,
    pub phase: SchedulerPhase,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Most recent callback failure; not cleared by later successes.
    pub last_error: Option<String>,
    pub stop_requested: bool,
    /// Completed callback invocations, successful or not.
    pub run_count: u64,
    pub error_count: u64,
}

impl SchedulerState {
    /// State of a scheduler that has not run yet.
    pub fn new(interval: Duration, enabled: bool) -> Self {
        Self {
            interval,
            enabled,
            running: false,
            phase: SchedulerPhase::Created,
            last_run_at: None,
            last_error: None,
            stop_requested: false,
            run_count: 0,
            error_count: 0,
        }
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// The background event loop.
///
/// Dropping a running `Scheduler` closes its shutdown channel, which the
/// task treats as a stop request; use [`Scheduler::stop`] to also wait
/// for the exit.
pub struct Scheduler {
    /// Published state, written by the task and by `stop`.
    state: Arc<watch::Sender<SchedulerState>>,
    /// Shutdown signal for the background task.
    shutdown_tx: watch::Sender<bool>,
    /// Handle to the background task; `None` when disabled or stopped.
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Start the event loop.
    ///
    /// `interval` must be positive. With `enabled = false` nothing is
    /// spawned and the scheduler stays in `Created`. Must be called from
    /// within a Tokio runtime when enabled.
    pub fn start(
        interval: Duration,
        enabled: bool,
        callback: StateCheckCallback,
    ) -> SchedulerResult<Self> {
        if interval.is_zero() {
            return Err(SchedulerError::Configuration(
                "check interval must be a positive duration".to_string(),
            ));
        }

        let (state_tx, _) = watch::channel(SchedulerState::new(interval, enabled));
        let state = Arc::new(state_tx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        if !enabled {
            info!("event loop disabled");
            return Ok(Self {
                state,
                shutdown_tx,
                handle: None,
            });
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        state.send_modify(|s| {
            s.running = true;
            s.phase = SchedulerPhase::Running;
        });

        let task_state = Arc::clone(&state);
        let handle = runtime.spawn(async move {
            run_event_loop(interval, callback, task_state, shutdown_rx).await;
        });

        info!(interval_ms = interval.as_millis() as u64, "event loop started");

        Ok(Self {
            state,
            shutdown_tx,
            handle: Some(handle),
        })
    }

    /// Current state snapshot. Never waits on the background task.
    pub fn status(&self) -> SchedulerState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    /// Request the loop to stop and wait up to `timeout` for it to exit.
    ///
    /// An in-flight callback is allowed to finish. Returns
    /// `ShutdownTimeout` if the task is still alive at the deadline; the
    /// task is not aborted and a later call waits on it again. Calling
    /// `stop` when nothing is running succeeds immediately.
    pub async fn stop(&mut self, timeout: Duration) -> SchedulerResult<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };

        if !self.state.borrow().stop_requested {
            let _ = self.shutdown_tx.send(true);
            self.state.send_modify(|s| {
                s.stop_requested = true;
                if s.phase == SchedulerPhase::Running {
                    s.phase = SchedulerPhase::StopRequested;
                }
            });
            info!("event loop stop requested");
        }

        match tokio::time::timeout(timeout, handle).await {
            Ok(joined) => {
                self.handle = None;
                let failure = joined.err().map(|e| format!("event loop task failed: {e}"));
                if let Some(ref detail) = failure {
                    error!(error = %detail, "event loop exited abnormally");
                }
                self.state.send_modify(|s| {
                    s.running = false;
                    s.phase = SchedulerPhase::Stopped;
                    if let Some(detail) = failure {
                        s.last_error = Some(detail);
                    }
                });
                info!("event loop stopped");
                Ok(())
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "event loop did not stop in time");
                Err(SchedulerError::ShutdownTimeout(timeout))
            }
        }
    }
}

/// The loop body run by the background task.
async fn run_event_loop(
    interval: Duration,
    callback: StateCheckCallback,
    state: Arc<watch::Sender<SchedulerState>>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("event loop task starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            // Also fires when the sender is dropped.
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        // Both the call and the returned future run in their own task, so
        // a panic in either is contained.
        let cb = Arc::clone(&callback);
        let outcome = match tokio::spawn(async move { cb().await }).await {
            Ok(result) => result,
            Err(e) => Err(format!("callback panicked: {e}")),
        };
        let finished_at = Utc::now();

        if let Err(ref detail) = outcome {
            warn!(error = %detail, "state check callback failed");
        } else {
            debug!("state check completed");
        }

        state.send_modify(|s| {
            s.last_run_at = Some(finished_at);
            s.run_count += 1;
            if let Err(detail) = outcome {
                s.last_error = Some(detail);
                s.error_count += 1;
            }
        });
    }

    state.send_modify(|s| {
        s.running = false;
        s.phase = SchedulerPhase::Stopped;
    });
    debug!("event loop task exited");
}
