use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;
use zeroize::Zeroize;

use super::resolver::{ResolveError, ResolvedSession, SessionResolver, validate_session_id};
use crate::utils::validate_resolver_url;

/// Session record served by the application's session API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionRecord {
    /// Short-lived upstream credential. The application API calls it
    /// `client_secret`; `credential` is accepted as an alias.
    #[serde(default, alias = "credential")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Resolves sessions by calling `GET {base_url}/{session_id}` on the
/// surrounding application.
///
/// `404` maps to [`ResolveError::NotFound`]; any other non-success status,
/// transport error or undecodable body maps to [`ResolveError::Backend`].
pub struct HttpSessionResolver {
    client: Client,
    base_url: Url,
    service_token: Option<String>,
}

impl HttpSessionResolver {
    pub fn new(
        base_url: &str,
        service_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ResolveError> {
        let base_url = validate_resolver_url(base_url)
            .map_err(|e| ResolveError::Backend(format!("invalid resolver url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ResolveError::Backend(format!(
                "resolver url cannot be a base: {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolveError::Backend(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            service_token,
        })
    }

    fn session_url(&self, session_id: &str) -> Result<Url, ResolveError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ResolveError::Backend("resolver url cannot be a base".to_string()))?
            .pop_if_empty()
            .push(session_id);
        Ok(url)
    }
}

impl Drop for HttpSessionResolver {
    fn drop(&mut self) {
        if let Some(ref mut token) = self.service_token {
            token.zeroize();
        }
    }
}

#[async_trait]
impl SessionResolver for HttpSessionResolver {
    async fn resolve(&self, session_id: &str) -> Result<ResolvedSession, ResolveError> {
        validate_session_id(session_id)?;
        let url = self.session_url(session_id)?;

        let mut request = self.client.get(url);
        if let Some(token) = &self.service_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ResolveError::Backend(format!("session lookup failed: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ResolveError::NotFound(session_id.to_string())),
            status if !status.is_success() => {
                return Err(ResolveError::Backend(format!(
                    "session lookup returned {status}"
                )));
            }
            _ => {}
        }

        let record: SessionRecord = response
            .json()
            .await
            .map_err(|e| ResolveError::Backend(format!("invalid session record: {e}")))?;

        let Some(secret) = record.client_secret.filter(|s| !s.trim().is_empty()) else {
            return Err(ResolveError::MissingCredential(session_id.to_string()));
        };

        let mut session = ResolvedSession::new(secret);
        session.model = record.model.filter(|m| !m.trim().is_empty());
        Ok(session)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
