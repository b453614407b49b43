//! catapult-metrics — process metrics shared by request handling, the
//! event loop, and the readiness aggregator.
//!
//! The registry is injected rather than global: every subsystem that
//! records metrics receives a clone of the same `MetricsRegistry`. All
//! values are atomics, so any number of tasks may write concurrently.
//!
//! # Architecture
//!
//! ```text
//! MetricsRegistry (Clone, Arc inside)
//!   ├── record_request()          ← HTTP middleware
//!   ├── track_in_progress()       ← HTTP middleware (drop guard)
//!   ├── record_event_loop_runs()  ← event loop state watcher
//!   ├── record_service_check()    ← readiness aggregator
//!   └── snapshot() → MetricsSnapshot
//!
//! Prometheus exposition
//!   └── render_prometheus(&MetricsSnapshot) → text/plain for /metrics
//! ```

pub mod histogram;
pub mod prometheus;
pub mod registry;

pub use histogram::{DEFAULT_BUCKETS, Histogram};
pub use prometheus::{CONTENT_TYPE, render_prometheus};
pub use registry::{HistogramSample, InProgressGuard, MetricsRegistry, MetricsSnapshot, Sample};
