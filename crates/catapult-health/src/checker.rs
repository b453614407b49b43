//! The checker capability and the shared HTTP probe.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use thiserror::Error;
use tracing::debug;

/// Outcome of one successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub reachable: bool,
    pub latency: Duration,
}

impl Probe {
    pub fn reachable(latency: Duration) -> Self {
        Self {
            reachable: true,
            latency,
        }
    }
}

/// Why a probe could not confirm reachability.
///
/// The `Display` form is what ends up in a result's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("timeout")]
    Timeout,

    /// Carries the underlying reason for logging.
    #[error("connection error")]
    Connection(String),

    #[error("unexpected status {0}")]
    Status(u16),
}

/// Tests reachability of one external integration.
#[async_trait]
pub trait ServiceChecker: Send + Sync {
    /// Perform one network probe and report reachability plus latency.
    async fn probe(&self) -> Result<Probe, CheckError>;
}

/// Send a request and time it.
///
/// Returns the response status and elapsed time, or the transport error
/// classified as `Timeout` or `Connection`.
pub async fn http_probe(request: RequestBuilder) -> Result<(StatusCode, Duration), CheckError> {
    let started = Instant::now();
    match request.send().await {
        Ok(resp) => {
            let latency = started.elapsed();
            debug!(status = %resp.status(), url = %resp.url(), "probe response");
            Ok((resp.status(), latency))
        }
        Err(e) if e.is_timeout() => {
            debug!(error = %e, "probe timed out");
            Err(CheckError::Timeout)
        }
        Err(e) => {
            debug!(error = %e, "probe connection failed");
            Err(CheckError::Connection(e.to_string()))
        }
    }
}

/// Map a probe status to the checker outcome: only 200 is reachable.
pub(crate) fn expect_ok(status: StatusCode, latency: Duration) -> Result<Probe, CheckError> {
    if status == StatusCode::OK {
        Ok(Probe::reachable(latency))
    } else {
        Err(CheckError::Status(status.as_u16()))
    }
}
