use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Longest session identifier accepted from a connection path.
pub const MAX_SESSION_ID_LEN: usize = 256;

/// Errors produced while resolving a session identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Unknown or expired session
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The session exists but carries no upstream credential
    #[error("Session {0} has no upstream credential")]
    MissingCredential(String),

    /// The session identifier or record is malformed
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// The resolver backend failed (network, decode, status)
    #[error("Session backend error: {0}")]
    Backend(String),

    /// The resolver does not support registration
    #[error("Session resolver is read-only")]
    ReadOnly,
}

/// Short-lived secret used to open one upstream link.
///
/// Never printed in full: `Debug` and `Display` show a four character
/// prefix and the length. The buffer is wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct UpstreamCredential(String);

impl UpstreamCredential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Raw secret, for building the upstream authorization header only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{prefix}***({} chars)", self.0.chars().count())
    }
}

impl fmt::Debug for UpstreamCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UpstreamCredential({})", self.redacted())
    }
}

impl fmt::Display for UpstreamCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// What a resolver hands back for a known session.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub credential: UpstreamCredential,
    /// Model bound to the session; falls back to the configured default.
    pub model: Option<String>,
}

impl ResolvedSession {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: UpstreamCredential::new(credential),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Looks up the upstream credential for a session identifier.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Resolve a session identifier.
    ///
    /// Implementations return [`ResolveError::NotFound`] for unknown ids and
    /// [`ResolveError::MissingCredential`] for records without a secret.
    async fn resolve(&self, session_id: &str) -> Result<ResolvedSession, ResolveError>;

    /// Store a session pushed by the surrounding application.
    async fn register(
        &self,
        _session_id: &str,
        _session: ResolvedSession,
    ) -> Result<(), ResolveError> {
        Err(ResolveError::ReadOnly)
    }

    /// Remove a session. Returns whether it existed.
    async fn revoke(&self, _session_id: &str) -> Result<bool, ResolveError> {
        Err(ResolveError::ReadOnly)
    }

    fn name(&self) -> &'static str;
}

/// Check a session identifier taken from a connection path.
pub fn validate_session_id(session_id: &str) -> Result<(), ResolveError> {
    if session_id.is_empty() {
        return Err(ResolveError::InvalidSession("empty session id".to_string()));
    }
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(ResolveError::InvalidSession(format!(
            "session id longer than {MAX_SESSION_ID_LEN} bytes"
        )));
    }
    if session_id
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || c == '/')
    {
        return Err(ResolveError::InvalidSession(
            "session id contains forbidden characters".to_string(),
        ));
    }
    Ok(())
}
