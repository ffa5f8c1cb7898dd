use crate::errors::auth_error::AuthError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Extract the bearer token from the `Authorization` header.
fn extract_token(request: &Request) -> Result<&str, AuthError> {
    let auth_header = request
        .headers()
        .get("authorization")
        .ok_or(AuthError::MissingAuthHeader)?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Guards the session registration API with the configured API secret.
///
/// Registration is disabled outright (503) when no secret is configured, so a
/// deployment cannot accidentally expose an open write endpoint. Tokens are
/// compared in constant time.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let request_method = request.method().to_string();
    let request_path = request.uri().path().to_string();

    if !state.config.has_api_secret() {
        tracing::warn!(
            method = %request_method,
            path = %request_path,
            "Registration request refused: no API secret configured"
        );
        return Err(AuthError::ConfigError(
            "session registration is disabled".to_string(),
        ));
    }

    let token = extract_token(&request)?;
    if !state.config.api_secret_matches(token) {
        tracing::warn!(
            method = %request_method,
            path = %request_path,
            "API secret authentication failed: token mismatch"
        );
        return Err(AuthError::Unauthorized("Invalid API secret".to_string()));
    }

    tracing::debug!(method = %request_method, path = %request_path, "API secret accepted");
    Ok(next.run(request).await)
}
