//! Health and Metrics Endpoint Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::test_server;

#[tokio::test]
async fn test_health_check_returns_version() {
    let server = test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_liveness_probe() {
    let server = test_server();

    let response = server.get("/health/live").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let server = test_server();

    let response = server.get("/health/ready").expect_failure().await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["database"]["status"], "unhealthy");
    assert_eq!(body["checks"]["redis"]["status"], "disabled");
    assert_eq!(body["checks"]["hub"]["connections"], 0);
}

#[tokio::test]
async fn test_metrics_exposes_request_counters() {
    let server = test_server();
    server.get("/health").await;

    let response = server.get("/metrics").await;

    response.assert_status_ok();
    let text = response.text();
    assert!(text.contains("community_hub_http_requests_total"));
    assert!(text.contains("path=\"/health\""));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = test_server();

    server
        .get("/api/v1/nothing-here")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
