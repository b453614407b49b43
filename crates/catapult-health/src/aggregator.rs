//! Readiness aggregator — fans out to every enabled checker and folds the
//! results into one verdict.
//!
//! Each probe runs on its own task bounded by the entry's timeout, so a
//! hung or panicking checker only affects its own result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use catapult_core::AppConfig;
use catapult_metrics::MetricsRegistry;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::checker::{CheckError, Probe, ServiceChecker};
use crate::error::HealthResult;
use crate::integrations::{ArgoCdChecker, FireHydrantChecker, JiraChecker};

/// One configured integration.
#[derive(Clone)]
pub struct ServiceEntry {
    pub name: String,
    pub enabled: bool,
    pub timeout: Duration,
    pub checker: Arc<dyn ServiceChecker>,
}

impl ServiceEntry {
    pub fn new(
        name: impl Into<String>,
        enabled: bool,
        timeout: Duration,
        checker: Arc<dyn ServiceChecker>,
    ) -> Self {
        Self {
            name: name.into(),
            enabled,
            timeout,
            checker,
        }
    }
}

impl std::fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Result of probing one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCheckResult {
    pub service: String,
    pub reachable: bool,
    pub checked_at: DateTime<Utc>,
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub latency: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_micros() as f64 / 1000.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    Ready,
    NotReady,
}

/// Aggregate readiness at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadinessSnapshot {
    pub status: ReadinessStatus,
    pub checked_at: DateTime<Utc>,
    pub results: Vec<ServiceCheckResult>,
}

impl ReadinessSnapshot {
    /// Fold per-service results. No results means vacuously ready.
    pub fn from_results(results: Vec<ServiceCheckResult>) -> Self {
        let status = if results.iter().all(|r| r.reachable) {
            ReadinessStatus::Ready
        } else {
            ReadinessStatus::NotReady
        };
        Self {
            status,
            checked_at: Utc::now(),
            results,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ReadinessStatus::Ready
    }
}

type ProbeOutcome = (Result<Result<Probe, CheckError>, tokio::time::error::Elapsed>, Duration);

/// Runs readiness checks across the configured integrations.
#[derive(Debug, Clone, Default)]
pub struct ReadinessAggregator {
    entries: Vec<ServiceEntry>,
    metrics: Option<MetricsRegistry>,
}

impl ReadinessAggregator {
    pub fn new(entries: Vec<ServiceEntry>) -> Self {
        Self {
            entries,
            metrics: None,
        }
    }

    /// Record every probe into the given registry.
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build checkers for the enabled integrations in declaration order:
    /// jira, argocd, firehydrant.
    pub fn from_config(config: &AppConfig) -> HealthResult<Self> {
        let mut entries = Vec::new();
        if config.jira.enabled {
            entries.push(ServiceEntry::new(
                "jira",
                true,
                config.jira.timeout,
                Arc::new(JiraChecker::new(&config.jira)?),
            ));
        }
        if config.argocd.enabled {
            entries.push(ServiceEntry::new(
                "argocd",
                true,
                config.argocd.timeout,
                Arc::new(ArgoCdChecker::new(&config.argocd)?),
            ));
        }
        if config.firehydrant.enabled {
            entries.push(ServiceEntry::new(
                "firehydrant",
                true,
                config.firehydrant.timeout,
                Arc::new(FireHydrantChecker::new(&config.firehydrant)?),
            ));
        }
        info!(services = ?entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), "readiness checks configured");
        Ok(Self::new(entries))
    }

    /// Names of the services that will be probed, in order.
    pub fn enabled_services(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Probe every enabled service concurrently and aggregate.
    pub async fn check(&self) -> ReadinessSnapshot {
        let pending: Vec<(&ServiceEntry, Instant, JoinHandle<ProbeOutcome>)> = self
            .entries
            .iter()
            .filter(|e| e.enabled)
            .map(|entry| {
                let checker = Arc::clone(&entry.checker);
                let timeout = entry.timeout;
                let started = Instant::now();
                let handle = tokio::spawn(async move {
                    let outcome = tokio::time::timeout(timeout, checker.probe()).await;
                    (outcome, started.elapsed())
                });
                (entry, started, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        for (entry, started, handle) in pending {
            let (reachable, latency, error) = match handle.await {
                Ok((Ok(Ok(probe)), _)) if probe.reachable => (true, probe.latency, None),
                Ok((Ok(Ok(_)), elapsed)) => (false, elapsed, Some("unreachable".to_string())),
                Ok((Ok(Err(e)), elapsed)) => {
                    if let CheckError::Connection(detail) = &e {
                        warn!(service = %entry.name, %detail, "readiness probe failed to connect");
                    }
                    (false, elapsed, Some(e.to_string()))
                }
                Ok((Err(_), elapsed)) => (false, elapsed, Some(CheckError::Timeout.to_string())),
                Err(join_err) => {
                    warn!(service = %entry.name, error = %join_err, "readiness checker panicked");
                    (false, started.elapsed(), Some("checker panicked".to_string()))
                }
            };

            if let Some(ref error) = error {
                warn!(service = %entry.name, %error, "service not reachable");
            } else {
                debug!(service = %entry.name, latency_ms = latency.as_millis() as u64, "service reachable");
            }
            if let Some(ref metrics) = self.metrics {
                metrics
                    .record_service_check(&entry.name, reachable, latency)
                    .await;
            }

            results.push(ServiceCheckResult {
                service: entry.name.clone(),
                reachable,
                checked_at: Utc::now(),
                latency,
                error,
            });
        }

        ReadinessSnapshot::from_results(results)
    }
}
