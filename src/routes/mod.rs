//! Router assembly.
//!
//! Layer order per group (outer to inner):
//! - realtime: connection_limit -> handler
//! - sessions: auth (API secret) -> handler
//! - public: handler

pub mod api;
pub mod realtime;

use axum::{Router, middleware};
use http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::middleware::{auth_middleware, connection_limit_middleware};
use crate::state::AppState;

/// Build the CORS layer from a comma-separated origin list or `*`.
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    match origins {
        Some("*") => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .allow_credentials(false),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(methods)
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_credentials(true)
        }
        None => {
            info!(
                "CORS not configured, defaulting to same-origin only. \
                 Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
            );
            // No allow_origin = same-origin only
            CorsLayer::new()
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_credentials(false)
        }
    }
}

/// Assemble every route with its middleware, CORS and security headers.
///
/// The returned router needs `into_make_service_with_connect_info::<SocketAddr>()`
/// because the connection limiter reads the peer address.
pub fn build_router(state: Arc<AppState>) -> Router {
    let realtime_routes = realtime::create_realtime_router().layer(
        middleware::from_fn_with_state(state.clone(), connection_limit_middleware),
    );

    let session_routes = api::create_session_router()
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let cors = cors_layer(state.config.cors_allowed_origins.as_deref());

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    api::create_public_router()
        .merge(session_routes)
        .merge(realtime_routes)
        .with_state(state)
        .layer(cors)
        .layer(security_headers)
}
