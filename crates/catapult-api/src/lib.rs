//! catapult-api — HTTP surface of the Catapult service.
//!
//! Maps the scheduler status, the readiness verdict and the metrics
//! registry onto a handful of GET routes. Every request passes through
//! the request-tracking middleware.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Liveness, always `healthy` |
//! | GET | `/ready` | Readiness of enabled integrations (200 / 503) |
//! | GET | `/status` | Background event loop state |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use catapult_health::ReadinessAggregator;
use catapult_metrics::MetricsRegistry;
use catapult_scheduler::SchedulerState;
use tokio::sync::watch;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub readiness: Arc<ReadinessAggregator>,
    /// Live view of the background scheduler, from `Scheduler::subscribe`.
    pub scheduler: watch::Receiver<SchedulerState>,
    pub metrics: MetricsRegistry,
}

/// Build the complete router with request tracking applied to every route.
pub fn build_router(state: ApiState) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/status", get(handlers::status))
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(
            metrics,
            middleware::track_requests,
        ))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use catapult_health::{CheckError, Probe, ServiceChecker, ServiceEntry};
    use tower::ServiceExt;

    use super::*;

    struct Fixed(Result<Probe, CheckError>);

    #[async_trait]
    impl ServiceChecker for Fixed {
        async fn probe(&self) -> Result<Probe, CheckError> {
            self.0.clone()
        }
    }

    struct Slow;

    #[async_trait]
    impl ServiceChecker for Slow {
        async fn probe(&self) -> Result<Probe, CheckError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Probe::reachable(Duration::from_secs(5)))
        }
    }

    fn entry(name: &str, outcome: Result<Probe, CheckError>) -> ServiceEntry {
        ServiceEntry::new(name, true, Duration::from_secs(1), Arc::new(Fixed(outcome)))
    }

    fn test_state(entries: Vec<ServiceEntry>) -> (ApiState, watch::Sender<SchedulerState>) {
        let (tx, rx) = watch::channel(SchedulerState::new(Duration::from_secs(15), true));
        let state = ApiState {
            readiness: Arc::new(ReadinessAggregator::new(entries)),
            scheduler: rx,
            metrics: MetricsRegistry::new(),
        };
        (state, tx)
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, String) {
        let resp = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_is_always_healthy() {
        let (state, _tx) = test_state(vec![entry("jira", Err(CheckError::Timeout))]);
        let (status, body) = get(build_router(state), "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn ready_with_no_integrations() {
        let (state, _tx) = test_state(vec![]);
        let (status, body) = get(build_router(state), "/ready").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["results"], serde_json::json!([]));
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn not_ready_is_503() {
        let (state, _tx) = test_state(vec![
            entry("jira", Ok(Probe::reachable(Duration::from_millis(5)))),
            entry("argocd", Err(CheckError::Connection("refused".to_string()))),
        ]);
        let (status, body) = get(build_router(state), "/ready").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "not_ready");
        assert_eq!(json["results"][1]["service"], "argocd");
        assert_eq!(json["results"][1]["error"], "connection error");
    }

    #[tokio::test]
    async fn status_reflects_scheduler() {
        let (state, tx) = test_state(vec![]);
        tx.send_modify(|s| s.run_count = 7);
        let (status, body) = get(build_router(state), "/status").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["run_count"], 7);
        assert_eq!(json["interval_ms"], 15000);
    }

    #[tokio::test]
    async fn requests_show_up_in_metrics() {
        let (state, _tx) = test_state(vec![]);
        let router = build_router(state);

        let (status, _) = get(router.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);

        let resp = router
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            resp.headers()["content-type"],
            catapult_metrics::CONTENT_TYPE
        );
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains(
            "http_requests_total{method=\"GET\",endpoint=\"/health\",status=\"200\"} 1\n"
        ));
        assert!(text.contains("http_request_duration_seconds_count{method=\"GET\",endpoint=\"/health\"} 1\n"));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (state, _tx) = test_state(vec![]);
        let (status, _) = get(build_router(state), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn abandoned_request_releases_in_progress_gauge() {
        let (mut state, _tx) = test_state(vec![]);
        state.readiness = Arc::new(ReadinessAggregator::new(vec![ServiceEntry::new(
            "jira",
            true,
            Duration::from_secs(10),
            Arc::new(Slow),
        )]));
        let metrics = state.metrics.clone();
        let router = build_router(state);

        let task = tokio::spawn(async move {
            router
                .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
                .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let text = metrics.render().await;
        assert!(text.contains("http_requests_in_progress{method=\"GET\",endpoint=\"/ready\"} 1\n"));

        // The client goes away before readiness is decided.
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        let text = metrics.render().await;
        assert!(text.contains("http_requests_in_progress{method=\"GET\",endpoint=\"/ready\"} 0\n"));
    }

    #[tokio::test]
    async fn unmatched_paths_share_one_series() {
        let (state, _tx) = test_state(vec![]);
        let metrics = state.metrics.clone();
        let router = build_router(state);

        for i in 0..200 {
            let (status, _) = get(router.clone(), &format!("/scan/{i}")).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }

        let snap = metrics.snapshot().await;
        assert_eq!(snap.requests_total.len(), 1);
        assert_eq!(snap.request_duration.len(), 1);
        assert_eq!(snap.requests_in_progress.len(), 1);
        assert_eq!(
            metrics
                .request_count("GET", middleware::UNMATCHED_ENDPOINT, 404)
                .await,
            200
        );
    }
}
