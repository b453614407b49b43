//! Route handlers.
//!
//! Handlers only read from `ApiState`; none of them mutate it.

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use catapult_health::ReadinessSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::ApiState;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct ReadyBody {
    #[serde(flatten)]
    snapshot: ReadinessSnapshot,
    timestamp: DateTime<Utc>,
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthBody {
        status: "healthy",
        timestamp: Utc::now(),
    })
}

/// GET /ready
///
/// Probes every enabled integration on each call.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.readiness.check().await;
    let code = if snapshot.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    debug!(status = ?snapshot.status, services = snapshot.results.len(), "readiness evaluated");

    (
        code,
        Json(ReadyBody {
            snapshot,
            timestamp: Utc::now(),
        }),
    )
}

/// GET /status
pub async fn status(State(state): State<ApiState>) -> impl IntoResponse {
    let current = state.scheduler.borrow().clone();
    Json(current)
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = state.metrics.render().await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, catapult_metrics::CONTENT_TYPE)],
        body,
    )
}
