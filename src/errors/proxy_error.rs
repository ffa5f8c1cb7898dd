//! Session failure taxonomy for the realtime relay.
//!
//! Every fatal condition a relay session can hit maps to exactly one
//! [`ProxyError`] variant, and every variant maps to the WebSocket close
//! code sent to the browser. Nothing here is retried.

use thiserror::Error;

/// WebSocket close codes sent to the client.
///
/// Codes in the 4000-4999 range are application-defined; the last three
/// digits loosely follow the matching HTTP status.
pub mod close_codes {
    /// Normal closure (RFC 6455).
    pub const NORMAL: u16 = 1000;
    /// Session identifier did not resolve.
    pub const SESSION_NOT_FOUND: u16 = 4404;
    /// Client went quiet for longer than the idle window.
    pub const IDLE_TIMEOUT: u16 = 4408;
    /// Bounded outbound buffer exhausted.
    pub const QUEUE_OVERFLOW: u16 = 4413;
    /// Client could not keep up with relayed upstream frames.
    pub const CLIENT_STALLED: u16 = 4429;
    /// Relay is missing endpoint, credential or model configuration.
    pub const SERVICE_MISCONFIGURED: u16 = 4500;
    /// Upstream link never opened.
    pub const UPSTREAM_CONNECT_FAILED: u16 = 4502;
    /// Upstream link failed or closed after opening.
    pub const UPSTREAM_CLOSED: u16 = 4503;
}

/// Fatal session errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProxyError {
    /// The session identifier is unknown or expired
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Endpoint, credential or model configuration is absent
    #[error("Upstream configuration missing: {0}")]
    UpstreamConfigMissing(String),

    /// The upstream link failed to open (network, auth rejection, timeout)
    #[error("Upstream connect failure: {0}")]
    UpstreamConnectFailure(String),

    /// The upstream link errored or closed after having been open
    #[error("Upstream runtime failure: {0}")]
    UpstreamRuntimeFailure(String),

    /// The client closed or its transport failed
    #[error("Client disconnected")]
    ClientDisconnect,

    /// Client frames arrived faster than the bounded buffer allows
    #[error("Outbound queue overflow (capacity {capacity})")]
    QueueOverflow { capacity: usize },

    /// The client writer rejected a relayed frame
    #[error("Client connection stalled: {0}")]
    ClientStalled(String),

    /// No traffic within the idle window
    #[error("Session idle for {0}s")]
    IdleTimeout(u64),
}

impl ProxyError {
    /// Close code delivered to the browser for this failure.
    pub fn close_code(&self) -> u16 {
        match self {
            ProxyError::SessionNotFound(_) => close_codes::SESSION_NOT_FOUND,
            ProxyError::UpstreamConfigMissing(_) => close_codes::SERVICE_MISCONFIGURED,
            ProxyError::UpstreamConnectFailure(_) => close_codes::UPSTREAM_CONNECT_FAILED,
            ProxyError::UpstreamRuntimeFailure(_) => close_codes::UPSTREAM_CLOSED,
            ProxyError::ClientDisconnect => close_codes::NORMAL,
            ProxyError::QueueOverflow { .. } => close_codes::QUEUE_OVERFLOW,
            ProxyError::ClientStalled(_) => close_codes::CLIENT_STALLED,
            ProxyError::IdleTimeout(_) => close_codes::IDLE_TIMEOUT,
        }
    }

    /// Short machine-readable reason, used as the close frame reason text.
    pub fn reason(&self) -> &'static str {
        match self {
            ProxyError::SessionNotFound(_) => "session_not_found",
            ProxyError::UpstreamConfigMissing(_) => "service_misconfigured",
            ProxyError::UpstreamConnectFailure(_) => "upstream_connect_failed",
            ProxyError::UpstreamRuntimeFailure(_) => "upstream_closed",
            ProxyError::ClientDisconnect => "client_disconnected",
            ProxyError::QueueOverflow { .. } => "queue_overflow",
            ProxyError::ClientStalled(_) => "client_stalled",
            ProxyError::IdleTimeout(_) => "idle_timeout",
        }
    }

    /// Whether the failure points at the relay deployment rather than at
    /// one user's session.
    pub fn is_service_level(&self) -> bool {
        matches!(self, ProxyError::UpstreamConfigMissing(_))
    }

    pub fn close_reason(&self) -> CloseReason {
        CloseReason {
            code: self.close_code(),
            reason: self.reason().to_string(),
        }
    }
}

/// Close code plus reason text for a WebSocket close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn normal() -> Self {
        Self {
            code: close_codes::NORMAL,
            reason: String::new(),
        }
    }
}
