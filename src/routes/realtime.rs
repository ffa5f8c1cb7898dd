//! Realtime relay route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::realtime::realtime_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the realtime relay router
///
/// # Endpoints
///
/// - `GET /realtime/{session_id}` - WebSocket upgrade
/// - `GET /ws/realtime/{session_id}/` - same handler, legacy path
///
/// After the upgrade every text and binary frame is relayed to the upstream
/// realtime endpoint and back, unchanged.
pub fn create_realtime_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/realtime/{session_id}", get(realtime_handler))
        .route("/ws/realtime/{session_id}/", get(realtime_handler))
        .layer(TraceLayer::new_for_http())
}
