//! Assembled-service tests.
//!
//! Builds the daemon's `Service` from real config, points the
//! integrations at mock servers and drives the router in-process.

use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use catapult_core::{AppConfig, load_config_with};
use catapultd::{SHUTDOWN_TIMEOUT, Service};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get_text(router: &Router, uri: &str) -> String {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

async fn mock_jira() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/serverInfo"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn jira_up_argocd_down_is_not_ready() {
    let jira = mock_jira().await;

    let mut config = AppConfig::default();
    config.catapult.event_loop.enabled = false;
    config.jira.enabled = true;
    config.jira.base_url = Some(jira.uri());
    config.jira.username = Some("bot".to_string());
    config.jira.api_token = Some("token".to_string());
    config.argocd.enabled = true;
    config.argocd.base_url = Some("http://127.0.0.1:1".to_string());
    config.argocd.token = Some("argo".to_string());
    config.argocd.timeout = Duration::from_secs(2);

    let mut service = Service::build(&config).unwrap();

    let (status, body) = get_json(&service.router, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["service"], "jira");
    assert_eq!(results[0]["reachable"], true);
    assert_eq!(results[1]["service"], "argocd");
    assert_eq!(results[1]["reachable"], false);
    assert_eq!(results[1]["error"], "connection error");

    // Liveness is independent of readiness.
    let (status, body) = get_json(&service.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let metrics = get_text(&service.router, "/metrics").await;
    assert!(metrics.contains(
        "catapult_readiness_checks_total{service=\"argocd\",result=\"unreachable\"} 1\n"
    ));

    service.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn all_integrations_up_is_ready() {
    let jira = mock_jira().await;
    let firehydrant = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&firehydrant)
        .await;

    let mut config = AppConfig::default();
    config.jira.enabled = true;
    config.jira.base_url = Some(jira.uri());
    config.jira.username = Some("bot".to_string());
    config.jira.api_token = Some("token".to_string());
    config.firehydrant.enabled = true;
    config.firehydrant.base_url = Some(firehydrant.uri());
    config.firehydrant.api_token = Some("fh".to_string());

    let mut service = Service::build(&config).unwrap();
    let (status, body) = get_json(&service.router, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["results"][1]["service"], "firehydrant");

    service.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn event_loop_runs_and_is_visible() {
    let mut config = AppConfig::default();
    config.catapult.event_loop.check_interval = Duration::from_millis(50);

    let mut service = Service::build(&config).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let (status, body) = get_json(&service.router, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], true);
    assert_eq!(body["phase"], "running");
    assert_eq!(body["interval_ms"], 50);
    assert!(body["run_count"].as_u64().unwrap() >= 1);
    assert_eq!(body["error_count"], 0);

    let metrics = get_text(&service.router, "/metrics").await;
    assert!(metrics.contains("custom_operations_total{operation_type=\"state_check\"}"));

    service.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();

    let (_, body) = get_json(&service.router, "/status").await;
    assert_eq!(body["running"], false);
    assert_eq!(body["phase"], "stopped");
    assert_eq!(body["stop_requested"], true);
}

#[tokio::test]
async fn service_from_yaml_file() {
    let jira = mock_jira().await;
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        format!(
            "catapult:\n  event_loop:\n    enabled: false\njira:\n  enabled: true\n  base_url: {}\n  username: bot\n  timeout: 2s\n",
            jira.uri()
        ),
    )
    .unwrap();

    // The token arrives through the environment.
    let config = load_config_with(Some(&config_path), |var| {
        (var == "JIRA_API_TOKEN").then(|| "from-env".to_string())
    })
    .unwrap();

    let mut service = Service::build(&config).unwrap();
    let (status, body) = get_json(&service.router, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["service"], "jira");

    let (_, body) = get_json(&service.router, "/status").await;
    assert_eq!(body["enabled"], false);
    assert_eq!(body["phase"], "created");

    service.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}
