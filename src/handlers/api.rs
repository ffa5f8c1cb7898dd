//! Health, stats and session registration endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::core::relay::RelayMetricsSnapshot;
use crate::core::session::{ResolvedSession, SessionRecord, validate_session_id};
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// `GET /` - liveness probe
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "OK" }))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub relay: RelayMetricsSnapshot,
    pub websocket_connections: usize,
    pub session_resolver: &'static str,
}

/// `GET /stats` - relay counters
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        relay: state.metrics.snapshot(),
        websocket_connections: state.ws_connection_count(),
        session_resolver: state.resolver.name(),
    })
}

/// `PUT /sessions/{session_id}` - register a session issued by the application
///
/// Body: `{"client_secret": "...", "model": "..."}`; `model` is optional.
pub async fn register_session(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(record): Json<SessionRecord>,
) -> AppResult<Response> {
    validate_session_id(&session_id)?;

    let secret = record
        .client_secret
        .filter(|secret| !secret.is_empty())
        .ok_or_else(|| AppError::BadRequest("client_secret is required".to_string()))?;

    let mut session = ResolvedSession::new(secret);
    if let Some(model) = record.model.filter(|model| !model.is_empty()) {
        session = session.with_model(model);
    }

    state.resolver.register(&session_id, session).await?;
    info!(session_id = %session_id, "Realtime session registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "session_id": session_id })),
    )
        .into_response())
}

/// `DELETE /sessions/{session_id}` - revoke a registered session
pub async fn revoke_session(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> AppResult<StatusCode> {
    if state.resolver.revoke(&session_id).await? {
        info!(session_id = %session_id, "Realtime session revoked");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("session {session_id}")))
    }
}
