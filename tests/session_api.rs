//! Session registration API tests
//!
//! Exercises the HTTP surface the surrounding application uses to hand
//! sessions to the relay, plus the health and stats endpoints.

mod common;

use reqwest::StatusCode;
use serde_json::{Value, json};

use common::*;

fn sessions_url(server: &TestServer, session_id: &str) -> String {
    server.http_url(&format!("/sessions/{session_id}"))
}

#[tokio::test]
async fn test_health_check() {
    let server = start_relay(test_config(None)).await;

    let response = reqwest::get(server.http_url("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "OK" }));
}

#[tokio::test]
async fn test_stats_reports_counters() {
    let server = start_relay(test_config(None)).await;

    let body: Value = reqwest::get(server.http_url("/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["relay"]["active_sessions"], 0);
    assert_eq!(body["websocket_connections"], 0);
    assert_eq!(body["session_resolver"], "memory");
}

#[tokio::test]
async fn test_register_then_connect_then_revoke() {
    let upstream = start_mock_upstream(UpstreamBehavior::Echo).await;
    let server = start_relay(test_config(Some(upstream.url()))).await;
    let http = reqwest::Client::new();

    let response = http
        .put(sessions_url(&server, "sess_api"))
        .bearer_auth(TEST_API_SECRET)
        .json(&json!({ "client_secret": TEST_CREDENTIAL, "model": TEST_MODEL }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["session_id"], "sess_api");

    let resolved = server.state.resolver.resolve("sess_api").await.unwrap();
    assert_eq!(resolved.credential.expose(), TEST_CREDENTIAL);
    assert_eq!(resolved.model.as_deref(), Some(TEST_MODEL));

    let response = http
        .delete(sessions_url(&server, "sess_api"))
        .bearer_auth(TEST_API_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = http
        .delete(sessions_url(&server, "sess_api"))
        .bearer_auth(TEST_API_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_requires_api_secret() {
    let server = start_relay(test_config(None)).await;
    let http = reqwest::Client::new();

    let missing = http
        .put(sessions_url(&server, "sess_auth"))
        .json(&json!({ "client_secret": TEST_CREDENTIAL }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = http
        .put(sessions_url(&server, "sess_auth"))
        .bearer_auth("not-the-secret")
        .json(&json!({ "client_secret": TEST_CREDENTIAL }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    assert!(server.state.resolver.resolve("sess_auth").await.is_err());
}

#[tokio::test]
async fn test_register_disabled_without_configured_secret() {
    let mut config = test_config(None);
    config.api_secret = None;
    let server = start_relay(config).await;

    let response = reqwest::Client::new()
        .put(sessions_url(&server, "sess_disabled"))
        .bearer_auth(TEST_API_SECRET)
        .json(&json!({ "client_secret": TEST_CREDENTIAL }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_register_rejects_missing_client_secret() {
    let server = start_relay(test_config(None)).await;

    let response = reqwest::Client::new()
        .put(sessions_url(&server, "sess_no_secret"))
        .bearer_auth(TEST_API_SECRET)
        .json(&json!({ "model": TEST_MODEL }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
