use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use super::resolver::{ResolveError, ResolvedSession, SessionResolver, validate_session_id};

/// Default lifetime of a registered session (one hour).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

const DEFAULT_MAX_SESSIONS: u64 = 100_000;

/// Session store backed by a TTL cache.
///
/// Entries expire `ttl` after registration; an expired entry resolves as
/// [`ResolveError::NotFound`].
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Cache<String, ResolvedSession>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_capacity(ttl: Duration, max_sessions: u64) -> Self {
        let sessions = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(max_sessions)
            .build();
        Self { sessions }
    }

    pub fn entry_count(&self) -> u64 {
        self.sessions.entry_count()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

#[async_trait]
impl SessionResolver for InMemorySessionStore {
    async fn resolve(&self, session_id: &str) -> Result<ResolvedSession, ResolveError> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| ResolveError::NotFound(session_id.to_string()))?;

        if session.credential.is_empty() {
            return Err(ResolveError::MissingCredential(session_id.to_string()));
        }
        Ok(session)
    }

    async fn register(
        &self,
        session_id: &str,
        session: ResolvedSession,
    ) -> Result<(), ResolveError> {
        validate_session_id(session_id)?;
        if session.credential.is_empty() {
            return Err(ResolveError::MissingCredential(session_id.to_string()));
        }
        tracing::debug!(session_id = %session_id, credential = %session.credential, "Session registered");
        self.sessions.insert(session_id.to_string(), session).await;
        Ok(())
    }

    async fn revoke(&self, session_id: &str) -> Result<bool, ResolveError> {
        Ok(self.sessions.remove(session_id).await.is_some())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
