//! Service assembly: one registry, one event loop, one readiness
//! aggregator, one router.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use catapult_api::{ApiState, build_router};
use catapult_core::AppConfig;
use catapult_health::ReadinessAggregator;
use catapult_metrics::MetricsRegistry;
use catapult_scheduler::{Scheduler, SchedulerError, SchedulerState, StateCheckCallback, callback};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long shutdown waits for the event loop to exit.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Operation label for the periodic state check.
const STATE_CHECK: &str = "state_check";

/// The periodic state check run by the event loop.
///
/// Counts each invocation under `custom_operations_total`.
pub fn state_check_callback(metrics: MetricsRegistry) -> StateCheckCallback {
    callback(move || {
        let metrics = metrics.clone();
        async move {
            metrics.inc_custom_counter(STATE_CHECK).await;
            debug!("state check completed");
            Ok(())
        }
    })
}

/// Mirror the scheduler's run and error counts into the event loop
/// counters of `metrics`.
///
/// Works on deltas, so coalesced state updates are still counted in
/// full. The task ends when the scheduler is dropped.
pub fn spawn_event_loop_metrics(
    mut state: watch::Receiver<SchedulerState>,
    metrics: MetricsRegistry,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (mut runs, mut errors) = (0u64, 0u64);
        loop {
            let (run_count, error_count) = {
                let s = state.borrow_and_update();
                (s.run_count, s.error_count)
            };
            if run_count > runs {
                metrics.record_event_loop_runs(
                    run_count - runs,
                    error_count.saturating_sub(errors),
                );
                runs = run_count;
                errors = error_count;
            }
            if state.changed().await.is_err() {
                break;
            }
        }
        debug!("event loop metrics watcher exited");
    })
}

/// A fully wired Catapult process, minus the listening socket.
pub struct Service {
    pub metrics: MetricsRegistry,
    pub scheduler: Scheduler,
    pub router: Router,
}

impl Service {
    /// Build every subsystem from a validated config and start the event
    /// loop. Must be called inside a Tokio runtime.
    pub fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let metrics = MetricsRegistry::new();

        let event_loop = &config.catapult.event_loop;
        let scheduler = Scheduler::start(
            event_loop.check_interval,
            event_loop.enabled,
            state_check_callback(metrics.clone()),
        )?;

        if scheduler.is_running() {
            // Detached; exits together with the scheduler.
            spawn_event_loop_metrics(scheduler.subscribe(), metrics.clone());
        }

        let readiness = ReadinessAggregator::from_config(config)?.with_metrics(metrics.clone());
        info!(
            services = ?readiness.enabled_services(),
            event_loop = event_loop.enabled,
            "subsystems initialized"
        );

        let router = build_router(ApiState {
            readiness: Arc::new(readiness),
            scheduler: scheduler.subscribe(),
            metrics: metrics.clone(),
        });

        Ok(Self {
            metrics,
            scheduler,
            router,
        })
    }

    /// Stop the event loop, waiting at most `timeout`.
    ///
    /// A loop that does not exit in time is logged and left to finish on
    /// its own.
    pub async fn shutdown(&mut self, timeout: Duration) -> anyhow::Result<()> {
        match self.scheduler.stop(timeout).await {
            Ok(()) => {
                info!("event loop stopped");
                Ok(())
            }
            Err(SchedulerError::ShutdownTimeout(waited)) => {
                warn!(waited_ms = waited.as_millis() as u64, "event loop did not stop in time");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
