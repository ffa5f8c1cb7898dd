use axum::{
    Router,
    routing::{get, put},
};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Public routes: health check and relay stats
pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/stats", get(api::stats))
        .layer(TraceLayer::new_for_http())
}

/// Session registration routes
///
/// Note: the API secret middleware is applied where state is available
/// (`build_router`), since `from_fn_with_state` needs it.
pub fn create_session_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/sessions/{session_id}",
            put(api::register_session).delete(api::revoke_session),
        )
        .layer(TraceLayer::new_for_http())
}
