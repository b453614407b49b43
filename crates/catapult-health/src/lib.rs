//! catapult-health — readiness of the external integrations.
//!
//! Each enabled integration (Jira, ArgoCD, FireHydrant) is represented by
//! a `ServiceChecker` that performs one network probe. The
//! `ReadinessAggregator` runs every enabled checker under its own timeout
//! and folds the results into a single `ReadinessSnapshot`.
//!
//! # Architecture
//!
//! ```text
//! ReadinessAggregator
//!   ├── ServiceEntry (name, enabled, timeout, Arc<dyn ServiceChecker>)
//!   │   └── one spawned task per probe, bounded by the entry's timeout
//!   ├── results joined in declaration order
//!   └── optional MetricsRegistry for per-service counters
//! ```
//!
//! # Failure isolation
//!
//! A checker that errors, panics, or exceeds its timeout yields a
//! `reachable = false` result for that service only. The aggregate is
//! `ready` iff every enabled service is reachable; with no enabled
//! services it is vacuously `ready`.

pub mod aggregator;
pub mod checker;
pub mod error;
pub mod integrations;

pub use aggregator::{
    ReadinessAggregator, ReadinessSnapshot, ReadinessStatus, ServiceCheckResult, ServiceEntry,
};
pub use checker::{CheckError, Probe, ServiceChecker};
pub use error::{HealthError, HealthResult};
pub use integrations::{ArgoCdChecker, FireHydrantChecker, JiraChecker};
