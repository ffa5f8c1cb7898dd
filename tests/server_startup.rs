//! Server Startup Tests
//!
//! Tests for configuration loading, state construction and router assembly.
//! These tests verify that the server can start correctly under various conditions.

mod common;

use std::io::Write;

use axum::{body::Body, http::Request};
use tower::util::ServiceExt;

use common::test_config;
use realtime_relay::{ServerConfig, routes::build_router, state::AppState};

/// The router builds and answers without any upstream or API secret.
#[tokio::test]
async fn test_router_with_minimal_config() {
    let mut config = test_config(None);
    config.api_secret = None;
    let state = AppState::new(config).unwrap();
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = build_router(AppState::new(test_config(None)).unwrap());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_http_resolver_is_selected_when_configured() {
    let mut config = test_config(None);
    config.session_resolver_url = Some("http://127.0.0.1:9/sessions".to_string());
    let state = AppState::new(config).unwrap();
    assert_eq!(state.resolver.name(), "http");
}

#[tokio::test]
async fn test_invalid_resolver_url_fails_state_construction() {
    let mut config = test_config(None);
    config.session_resolver_url = Some("ftp://example.com/sessions".to_string());
    assert!(AppState::new(config).is_err());
}

#[test]
fn test_config_file_drives_relay_settings() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
server:
  host: "127.0.0.1"
  port: 4100
upstream:
  url: "wss://realtime.example.com/v1/realtime"
  model: "gpt-realtime-mini"
relay:
  queue_capacity: 32
  link_buffer: 64
  idle_timeout_seconds: 0
sessions:
  api_secret: "file-secret"
"#
    )
    .unwrap();

    let config = ServerConfig::from_file(&file.path().to_path_buf()).unwrap();
    assert_eq!(config.address(), "127.0.0.1:4100");
    assert!(config.api_secret_matches("file-secret"));

    let relay = config.relay_config();
    assert_eq!(
        relay.upstream_url.as_deref(),
        Some("wss://realtime.example.com/v1/realtime")
    );
    assert_eq!(relay.default_model.as_deref(), Some("gpt-realtime-mini"));
    assert_eq!(relay.queue_capacity, 32);
    assert!(relay.idle_timeout.is_none());
}

#[test]
fn test_config_file_rejects_undersized_link_buffer() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
relay:
  queue_capacity: 64
  link_buffer: 8
"#
    )
    .unwrap();

    let err = ServerConfig::from_file(&file.path().to_path_buf()).unwrap_err();
    assert!(err.to_string().contains("link_buffer"));
}
