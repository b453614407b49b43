//! Metrics registry — the counters, gauges and histograms of the process.
//!
//! Uses atomics for every value and `RwLock`-protected maps only for
//! label lookup, so concurrent writers never contend on a value.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use crate::histogram::Histogram;

type RequestKey = (String, String, u16);
type RouteKey = (String, String);

#[derive(Debug, Default)]
struct Inner {
    /// (method, endpoint, status) → count.
    requests: RwLock<BTreeMap<RequestKey, Arc<AtomicU64>>>,
    /// (method, endpoint) → latency histogram.
    latency: RwLock<BTreeMap<RouteKey, Arc<Histogram>>>,
    /// (method, endpoint) → requests currently being served.
    in_progress: RwLock<BTreeMap<RouteKey, Arc<AtomicI64>>>,
    /// operation_type → count.
    custom_counters: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
    /// metric_name → f64 bits.
    custom_gauges: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
    event_loop_runs: AtomicU64,
    event_loop_errors: AtomicU64,
    /// (service, "reachable" | "unreachable") → count.
    service_checks: RwLock<BTreeMap<(String, &'static str), Arc<AtomicU64>>>,
    /// service → last check latency, f64 seconds as bits.
    service_latency: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
}

/// Shared, thread-safe metrics registry. Cloning is cheap and every clone
/// writes to the same values.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<Inner>,
}

/// One labelled value of a counter or gauge family.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

/// One labelled histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSample {
    pub labels: Vec<(&'static str, String)>,
    /// Cumulative `(upper_bound, count)` pairs, excluding `+Inf`.
    pub buckets: Vec<(f64, u64)>,
    pub count: u64,
    pub sum: f64,
}

/// Point-in-time copy of every metric family.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub requests_total: Vec<Sample>,
    pub request_duration: Vec<HistogramSample>,
    pub requests_in_progress: Vec<Sample>,
    pub custom_operations_total: Vec<Sample>,
    pub custom_value: Vec<Sample>,
    pub event_loop_runs_total: u64,
    pub event_loop_errors_total: u64,
    pub readiness_checks_total: Vec<Sample>,
    pub service_check_latency: Vec<Sample>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed HTTP request.
    pub async fn record_request(&self, method: &str, endpoint: &str, status: u16, latency: Duration) {
        let key = (method.to_string(), endpoint.to_string(), status);
        slot(&self.inner.requests, key)
            .await
            .fetch_add(1, Ordering::Relaxed);

        let route = (method.to_string(), endpoint.to_string());
        slot(&self.inner.latency, route).await.observe(latency);
    }

    /// Raise the in-progress gauge for a route until the returned guard
    /// is dropped.
    pub async fn track_in_progress(&self, method: &str, endpoint: &str) -> InProgressGuard {
        let route = (method.to_string(), endpoint.to_string());
        let gauge = slot(&self.inner.in_progress, route).await;
        gauge.fetch_add(1, Ordering::Relaxed);
        InProgressGuard { gauge }
    }

    /// Increment `custom_operations_total{operation_type}`.
    pub async fn inc_custom_counter(&self, operation_type: &str) {
        slot(&self.inner.custom_counters, operation_type.to_string())
            .await
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Set `custom_value{metric_name}`.
    pub async fn set_custom_gauge(&self, metric_name: &str, value: f64) {
        slot(&self.inner.custom_gauges, metric_name.to_string())
            .await
            .store(value.to_bits(), Ordering::Relaxed);
    }

    /// Add completed event loop iterations, `errors` of which failed.
    pub fn record_event_loop_runs(&self, runs: u64, errors: u64) {
        self.inner.event_loop_runs.fetch_add(runs, Ordering::Relaxed);
        self.inner.event_loop_errors.fetch_add(errors, Ordering::Relaxed);
    }

    /// Record the outcome of one readiness check against a service.
    pub async fn record_service_check(&self, service: &str, reachable: bool, latency: Duration) {
        let result = if reachable { "reachable" } else { "unreachable" };
        slot(&self.inner.service_checks, (service.to_string(), result))
            .await
            .fetch_add(1, Ordering::Relaxed);
        slot(&self.inner.service_latency, service.to_string())
            .await
            .store(latency.as_secs_f64().to_bits(), Ordering::Relaxed);
        debug!(%service, reachable, "service check recorded");
    }

    /// Current request count for one (method, endpoint, status) triple.
    pub async fn request_count(&self, method: &str, endpoint: &str, status: u16) -> u64 {
        let key = (method.to_string(), endpoint.to_string(), status);
        self.inner
            .requests
            .read()
            .await
            .get(&key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Current value of `custom_operations_total{operation_type}`.
    pub async fn custom_counter(&self, operation_type: &str) -> u64 {
        self.inner
            .custom_counters
            .read()
            .await
            .get(operation_type)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Copy every family. Entries are ordered by label values.
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;

        let requests_total = inner
            .requests
            .read()
            .await
            .iter()
            .map(|((method, endpoint, status), c)| Sample {
                labels: vec![
                    ("method", method.clone()),
                    ("endpoint", endpoint.clone()),
                    ("status", status.to_string()),
                ],
                value: c.load(Ordering::Relaxed) as f64,
            })
            .collect();

        let request_duration = inner
            .latency
            .read()
            .await
            .iter()
            .map(|((method, endpoint), h)| HistogramSample {
                labels: vec![("method", method.clone()), ("endpoint", endpoint.clone())],
                buckets: h.cumulative(),
                count: h.count(),
                sum: h.sum_seconds(),
            })
            .collect();

        let requests_in_progress = inner
            .in_progress
            .read()
            .await
            .iter()
            .map(|((method, endpoint), g)| Sample {
                labels: vec![("method", method.clone()), ("endpoint", endpoint.clone())],
                value: g.load(Ordering::Relaxed) as f64,
            })
            .collect();

        let custom_operations_total = inner
            .custom_counters
            .read()
            .await
            .iter()
            .map(|(op, c)| Sample {
                labels: vec![("operation_type", op.clone())],
                value: c.load(Ordering::Relaxed) as f64,
            })
            .collect();

        let custom_value = inner
            .custom_gauges
            .read()
            .await
            .iter()
            .map(|(name, g)| Sample {
                labels: vec![("metric_name", name.clone())],
                value: f64::from_bits(g.load(Ordering::Relaxed)),
            })
            .collect();

        let readiness_checks_total = inner
            .service_checks
            .read()
            .await
            .iter()
            .map(|((service, result), c)| Sample {
                labels: vec![("service", service.clone()), ("result", result.to_string())],
                value: c.load(Ordering::Relaxed) as f64,
            })
            .collect();

        let service_check_latency = inner
            .service_latency
            .read()
            .await
            .iter()
            .map(|(service, g)| Sample {
                labels: vec![("service", service.clone())],
                value: f64::from_bits(g.load(Ordering::Relaxed)),
            })
            .collect();

        MetricsSnapshot {
            requests_total,
            request_duration,
            requests_in_progress,
            custom_operations_total,
            custom_value,
            event_loop_runs_total: inner.event_loop_runs.load(Ordering::Relaxed),
            event_loop_errors_total: inner.event_loop_errors.load(Ordering::Relaxed),
            readiness_checks_total,
            service_check_latency,
        }
    }

    /// Snapshot and render in Prometheus text format.
    pub async fn render(&self) -> String {
        crate::prometheus::render_prometheus(&self.snapshot().await)
    }
}

/// Holds one unit of `http_requests_in_progress` for a route.
///
/// Dropping it releases the unit, including when the request future is
/// cancelled mid-flight.
#[derive(Debug)]
pub struct InProgressGuard {
    gauge: Arc<AtomicI64>,
}

impl Drop for InProgressGuard {
    fn drop(&mut self) {
        self.gauge.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Fetch the value for `key`, inserting a default on first use.
async fn slot<K, V>(map: &RwLock<BTreeMap<K, Arc<V>>>, key: K) -> Arc<V>
where
    K: Ord,
    V: Default,
{
    if let Some(v) = map.read().await.get(&key) {
        return Arc::clone(v);
    }
    let mut map = map.write().await;
    Arc::clone(map.entry(key).or_default())
}
