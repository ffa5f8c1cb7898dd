//! Process-wide relay counters.
//!
//! Shared by every session through an `Arc`; all fields are relaxed atomics
//! and are only ever incremented or read.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct RelayMetrics {
    active_sessions: AtomicU64,
    sessions_started: AtomicU64,
    sessions_rejected: AtomicU64,
    sessions_failed: AtomicU64,
    frames_to_upstream: AtomicU64,
    frames_to_client: AtomicU64,
    frames_dropped: AtomicU64,
    frames_discarded: AtomicU64,
}

/// Point-in-time copy of [`RelayMetrics`].
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RelayMetricsSnapshot {
    pub active_sessions: u64,
    pub sessions_started: u64,
    pub sessions_rejected: u64,
    pub sessions_failed: u64,
    pub frames_to_upstream: u64,
    pub frames_to_client: u64,
    pub frames_dropped: u64,
    pub frames_discarded: u64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_ended(&self) {
        // Saturating so a stray double call cannot wrap the gauge.
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    pub fn session_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_to_upstream(&self) {
        self.frames_to_upstream.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_to_client(&self) {
        self.frames_to_client.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_dropped(&self, count: u64) {
        self.frames_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn frames_discarded(&self, count: u64) {
        self.frames_discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn active_sessions(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> RelayMetricsSnapshot {
        RelayMetricsSnapshot {
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_rejected: self.sessions_rejected.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            frames_to_upstream: self.frames_to_upstream.load(Ordering::Relaxed),
            frames_to_client: self.frames_to_client.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_gauge() {
        let metrics = RelayMetrics::new();
        metrics.session_started();
        metrics.session_started();
        metrics.session_ended();
        assert_eq!(metrics.active_sessions(), 1);

        metrics.session_ended();
        metrics.session_ended();
        assert_eq!(metrics.active_sessions(), 0);
        assert_eq!(metrics.snapshot().sessions_started, 2);
    }

    #[test]
    fn test_frame_counters() {
        let metrics = RelayMetrics::new();
        metrics.frame_to_upstream();
        metrics.frame_to_client();
        metrics.frame_to_client();
        metrics.frames_dropped(3);
        metrics.frames_discarded(4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_to_upstream, 1);
        assert_eq!(snapshot.frames_to_client, 2);
        assert_eq!(snapshot.frames_dropped, 3);
        assert_eq!(snapshot.frames_discarded, 4);
    }
}
