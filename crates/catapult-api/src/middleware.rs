//! Request tracking: count, latency and in-flight gauge per route.

use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use catapult_metrics::MetricsRegistry;
use tracing::debug;

/// Endpoint label for requests that match no route.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Record every request into the registry.
///
/// Routed requests are labelled with their route template. Everything
/// else shares the `unmatched` label so arbitrary paths never create new
/// series.
pub async fn track_requests(
    State(metrics): State<MetricsRegistry>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_string();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string());

    // Released on drop, so an abandoned request does not pin the gauge.
    let in_progress = metrics.track_in_progress(&method, &endpoint).await;
    let started = Instant::now();

    let response = next.run(req).await;

    let latency = started.elapsed();
    let status = response.status().as_u16();
    drop(in_progress);
    metrics
        .record_request(&method, &endpoint, status, latency)
        .await;
    debug!(%method, %endpoint, status, latency_ms = latency.as_millis() as u64, "request served");

    response
}
