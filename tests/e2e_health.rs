//! E2E tests for health check and metrics endpoints

mod common;

use common::TestServer;

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let response = server.get("/health", None).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let server = TestServer::new().await;

    let response = server.get("/nonexistent", None).await;

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::new().await;

    let response = server.get("/metrics", None).await;

    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = response.text().await.unwrap();
    assert!(body.contains("octodash_active_sessions"));
    assert!(body.contains("octodash_logouts_total"));
}

#[tokio::test]
async fn test_metrics_count_login_outcomes() {
    let server = TestServer::new().await;
    server.login().await;

    let body = server.get("/metrics", None).await.text().await.unwrap();

    assert!(body.contains(r#"octodash_login_attempts_total{outcome="success"}"#));
}
