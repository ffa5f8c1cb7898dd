use std::fmt;

use super::queue::OutboundQueue;
use crate::core::session::UpstreamCredential;

/// Lifecycle of one relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Client accepted, session id not yet resolved
    Connecting,
    /// Upstream link started; client frames are queued
    AwaitingUpstream,
    /// Both sides open; frames flow straight through
    Bridged,
    /// One side is gone; closing the other
    Closing,
    /// Terminal
    Closed,
}

impl SessionState {
    /// Whether frames may still be accepted from either side.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::AwaitingUpstream | SessionState::Bridged
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::AwaitingUpstream => "awaiting_upstream",
            SessionState::Bridged => "bridged",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Per-session frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    /// Client frames delivered to the upstream link
    pub forwarded: u64,
    /// Upstream frames delivered to the client writer
    pub relayed: u64,
    /// Frames refused because a buffer was full or a side was closing
    pub dropped: u64,
    /// Queued client frames thrown away at teardown
    pub discarded: u64,
}

/// State of one browser <-> upstream pairing, owned by its bridge.
#[derive(Debug)]
pub struct ProxySession {
    session_id: String,
    pub(crate) credential: Option<UpstreamCredential>,
    pub(crate) state: SessionState,
    pub(crate) queue: OutboundQueue,
    pub(crate) counters: SessionCounters,
}

impl ProxySession {
    pub fn new(session_id: impl Into<String>, queue_capacity: usize) -> Self {
        Self {
            session_id: session_id.into(),
            credential: None,
            state: SessionState::Connecting,
            queue: OutboundQueue::new(queue_capacity),
            counters: SessionCounters::default(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_starts_connecting() {
        let session = ProxySession::new("abc", 4);
        assert_eq!(session.session_id(), "abc");
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.counters(), SessionCounters::default());
        assert_eq!(session.queued(), 0);
        assert!(session.credential.is_none());
    }

    #[test]
    fn test_live_states() {
        assert!(SessionState::AwaitingUpstream.is_live());
        assert!(SessionState::Bridged.is_live());
        assert!(!SessionState::Closing.is_live());
        assert!(!SessionState::Closed.is_live());
        assert_eq!(SessionState::AwaitingUpstream.to_string(), "awaiting_upstream");
    }
}
