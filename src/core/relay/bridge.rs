//! The bridge: one relay session's state machine.
//!
//! A bridge owns the [`ProxySession`], the client writer handle and the
//! upstream link. Every state change happens on the session task, in the
//! order events arrive:
//!
//! ```text
//!  Connecting ──resolve ok──▶ AwaitingUpstream ──Opened──▶ Bridged
//!      │                            │                         │
//!      └─resolve failed─▶ Closed    └──────── any failure ────┴──▶ Closing ──▶ Closed
//! ```
//!
//! The `on_*` handlers never block. Anything that needs to wait, such as
//! stopping the upstream worker or flushing the close frame to the browser,
//! happens once in [`Bridge::teardown`], bounded by the teardown timeout.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use super::client::{ClientEvent, ClientHandle, ClientSendError};
use super::frame::{Direction, Frame, RelayedMessage};
use super::inspect::log_frame;
use super::metrics::RelayMetrics;
use super::queue::{DEFAULT_QUEUE_CAPACITY, QueueError};
use super::session::{ProxySession, SessionCounters, SessionState};
use super::upstream::{
    DEFAULT_LINK_BUFFER, UpstreamConnector, UpstreamError, UpstreamEvent, UpstreamLink,
    UpstreamTarget,
};
use crate::core::session::{ResolveError, SessionResolver};
use crate::errors::{CloseReason, ProxyError};

/// Default bound on the Closing -> Closed transition.
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_millis(2000);

/// Per-session relay settings, derived from the server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Upstream realtime endpoint (`ws://` or `wss://`)
    pub upstream_url: Option<String>,
    /// Model used when the session record does not name one
    pub default_model: Option<String>,
    /// Client frames buffered before the upstream opens
    pub queue_capacity: usize,
    /// Upstream events buffered between the worker and the session task
    pub event_buffer: usize,
    pub teardown_timeout: Duration,
    /// Close sessions without traffic for this long; `None` disables it
    pub idle_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream_url: None,
            default_model: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            event_buffer: DEFAULT_LINK_BUFFER,
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
            idle_timeout: None,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    /// Close frame sent to the browser, if one was sent
    pub client_close: Option<CloseReason>,
    /// The failure that ended the session; `ClientDisconnect` for normal hangups
    pub cause: ProxyError,
    pub counters: SessionCounters,
}

pub struct Bridge {
    session: ProxySession,
    client: ClientHandle,
    config: Arc<RelayConfig>,
    connector: Arc<dyn UpstreamConnector>,
    metrics: Arc<RelayMetrics>,
    upstream: Option<UpstreamLink>,
    cause: Option<ProxyError>,
    started: bool,
}

impl Bridge {
    pub fn new(
        session_id: impl Into<String>,
        client: ClientHandle,
        config: Arc<RelayConfig>,
        connector: Arc<dyn UpstreamConnector>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        let session = ProxySession::new(session_id, config.queue_capacity);
        Self {
            session,
            client,
            config,
            connector,
            metrics,
            upstream: None,
            cause: None,
            started: false,
        }
    }

    pub fn session(&self) -> &ProxySession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    /// Resolve the session and start the upstream link.
    ///
    /// On success the bridge is `AwaitingUpstream` and the returned receiver
    /// carries the link's events. On failure the client has already been
    /// sent the matching close code and the bridge is `Closed`; no upstream
    /// connection was attempted.
    pub async fn accept(
        &mut self,
        resolver: &dyn SessionResolver,
    ) -> Result<mpsc::Receiver<UpstreamEvent>, ProxyError> {
        let session_id = self.session.session_id().to_string();

        match self.start(resolver).await {
            Ok(events) => {
                self.started = true;
                self.metrics.session_started();
                self.session.state = SessionState::AwaitingUpstream;
                info!(
                    session_id = %session_id,
                    resolver = resolver.name(),
                    "Relay session accepted, waiting for upstream"
                );
                Ok(events)
            }
            Err(err) => {
                if err.is_service_level() {
                    error!(session_id = %session_id, error = %err, "Relay misconfigured");
                } else {
                    info!(session_id = %session_id, error = %err, "Rejecting relay session");
                }
                self.metrics.session_rejected();
                self.session.state = SessionState::Closed;
                if !self
                    .client
                    .close(err.close_reason(), self.config.teardown_timeout)
                    .await
                {
                    debug!(session_id = %session_id, "Client gone before rejection close");
                }
                Err(err)
            }
        }
    }

    async fn start(
        &mut self,
        resolver: &dyn SessionResolver,
    ) -> Result<mpsc::Receiver<UpstreamEvent>, ProxyError> {
        let session_id = self.session.session_id().to_string();

        let resolved = resolver
            .resolve(&session_id)
            .await
            .map_err(|e| match e {
                ResolveError::NotFound(_) | ResolveError::InvalidSession(_) => {
                    ProxyError::SessionNotFound(session_id.clone())
                }
                ResolveError::MissingCredential(_) => {
                    ProxyError::UpstreamConfigMissing("session has no upstream credential".into())
                }
                other => ProxyError::UpstreamConfigMissing(other.to_string()),
            })?;

        let endpoint = self
            .config
            .upstream_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProxyError::UpstreamConfigMissing("upstream_url".into()))?;

        let model = resolved
            .model
            .as_deref()
            .or(self.config.default_model.as_deref())
            .filter(|model| !model.is_empty())
            .ok_or_else(|| ProxyError::UpstreamConfigMissing("model".into()))?;

        let target = UpstreamTarget::new(endpoint, model, resolved.credential.clone())
            .map_err(|e| ProxyError::UpstreamConfigMissing(e.to_string()))?;
        self.session.credential = Some(resolved.credential);

        let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer.max(1));
        self.upstream = Some(self.connector.open(target, events_tx));
        Ok(events_rx)
    }

    /// Move to `Closing` with `cause`, unless already closing. The first
    /// cause wins.
    fn fail(&mut self, cause: ProxyError) {
        if !self.session.state.is_live() {
            return;
        }
        let session_id = self.session.session_id();
        match &cause {
            ProxyError::ClientDisconnect => {
                info!(session_id = %session_id, "Client disconnected");
            }
            ProxyError::UpstreamConnectFailure(_) | ProxyError::UpstreamRuntimeFailure(_) => {
                error!(session_id = %session_id, state = %self.session.state, error = %cause, "Upstream failed");
            }
            _ => {
                warn!(session_id = %session_id, state = %self.session.state, error = %cause, "Closing relay session");
            }
        }
        self.session.state = SessionState::Closing;
        self.cause = Some(cause);
    }

    fn drop_frame(&mut self) {
        self.session.counters.dropped += 1;
        self.metrics.frames_dropped(1);
    }

    /// A data frame arrived from the browser.
    pub fn on_client_message(&mut self, frame: Frame) {
        let message = RelayedMessage::new(Direction::ClientToUpstream, frame);
        log_frame(self.session.session_id(), &message);
        let frame = message.frame;

        match self.session.state {
            SessionState::Connecting | SessionState::AwaitingUpstream => {
                if let Err((_, err)) = self.session.queue.enqueue(frame) {
                    self.drop_frame();
                    match err {
                        QueueError::Full { capacity } => {
                            self.fail(ProxyError::QueueOverflow { capacity })
                        }
                        QueueError::Closed => self.fail(ProxyError::UpstreamRuntimeFailure(
                            "queue closed before upstream opened".into(),
                        )),
                    }
                }
            }
            SessionState::Bridged => self.forward_upstream(frame),
            SessionState::Closing | SessionState::Closed => {
                debug!(session_id = %self.session.session_id(), "Dropping client frame, session closing");
                self.drop_frame();
            }
        }
    }

    fn forward_upstream(&mut self, frame: Frame) {
        let Some(link) = self.upstream.as_mut() else {
            self.drop_frame();
            self.fail(ProxyError::UpstreamRuntimeFailure("no upstream link".into()));
            return;
        };

        match link.send(frame) {
            Ok(()) => {
                self.session.counters.forwarded += 1;
                self.metrics.frame_to_upstream();
            }
            Err(UpstreamError::Backpressure { capacity }) => {
                self.drop_frame();
                self.fail(ProxyError::QueueOverflow { capacity });
            }
            Err(err) => {
                self.drop_frame();
                self.fail(ProxyError::UpstreamRuntimeFailure(err.to_string()));
            }
        }
    }

    /// The upstream link reported open: flush the queue in order, then
    /// switch to live forwarding.
    pub fn on_upstream_open(&mut self) {
        if self.session.state != SessionState::AwaitingUpstream {
            debug!(session_id = %self.session.session_id(), state = %self.session.state, "Ignoring late upstream open");
            return;
        }
        let opened = self.upstream.as_mut().is_some_and(|link| link.mark_open());
        if !opened {
            self.fail(ProxyError::UpstreamConnectFailure(
                "link closed before open".into(),
            ));
            return;
        }

        let queued = self.session.queue.take_all();
        let flushed = queued.len();
        self.session.state = SessionState::Bridged;

        for frame in queued {
            if self.session.state != SessionState::Bridged {
                // An earlier frame failed; the rest cannot be delivered.
                self.drop_frame();
                continue;
            }
            self.forward_upstream(frame);
        }

        info!(
            session_id = %self.session.session_id(),
            flushed,
            "Upstream open, session bridged"
        );
    }

    /// A frame arrived from the upstream.
    pub fn on_upstream_message(&mut self, frame: Frame) {
        if self.session.state != SessionState::Bridged {
            debug!(session_id = %self.session.session_id(), state = %self.session.state, "Dropping upstream frame");
            self.drop_frame();
            return;
        }

        let message = RelayedMessage::new(Direction::UpstreamToClient, frame);
        log_frame(self.session.session_id(), &message);
        let frame = message.frame;

        match self.client.send(frame) {
            Ok(()) => {
                self.session.counters.relayed += 1;
                self.metrics.frame_to_client();
            }
            Err(err) => {
                self.drop_frame();
                let cause = match err {
                    ClientSendError::Full => ProxyError::ClientStalled("writer buffer full".into()),
                    ClientSendError::Closed => ProxyError::ClientDisconnect,
                };
                self.fail(cause);
            }
        }
    }

    /// The upstream reported a transport or handshake error.
    pub fn on_upstream_error(&mut self, message: String) {
        let cause = self.upstream_failure(message);
        self.fail(cause);
    }

    /// The upstream connection is gone.
    pub fn on_upstream_closed(&mut self, code: Option<u16>, reason: &str) {
        let detail = match code {
            Some(code) => format!("upstream closed with code {code}: {reason}"),
            None => format!("upstream closed: {reason}"),
        };
        let cause = self.upstream_failure(detail);
        self.fail(cause);
    }

    /// The upstream event channel closed without a `Closed` event.
    fn on_upstream_gone(&mut self) {
        let cause = self.upstream_failure("upstream worker exited".into());
        self.fail(cause);
    }

    fn upstream_failure(&self, detail: String) -> ProxyError {
        if self.session.state == SessionState::Bridged {
            ProxyError::UpstreamRuntimeFailure(detail)
        } else {
            ProxyError::UpstreamConnectFailure(detail)
        }
    }

    /// The browser closed (or its transport failed).
    pub fn on_client_closed(&mut self, code: Option<u16>) {
        debug!(session_id = %self.session.session_id(), ?code, "Client close received");
        self.fail(ProxyError::ClientDisconnect);
    }

    fn on_idle(&mut self, idle: Duration) {
        self.fail(ProxyError::IdleTimeout(idle.as_secs()));
    }

    /// Drive the session until either side ends it, then tear down.
    pub async fn run<S>(
        mut self,
        mut client_events: S,
        mut upstream_events: mpsc::Receiver<UpstreamEvent>,
    ) -> SessionSummary
    where
        S: Stream<Item = ClientEvent> + Unpin,
    {
        let idle_timeout = self.config.idle_timeout;
        let mut deadline = idle_timeout.map(|idle| Instant::now() + idle);

        while self.session.state.is_live() {
            let at = deadline;
            let idle = async move {
                match at {
                    Some(at) => sleep_until(at).await,
                    None => future::pending::<()>().await,
                }
            };

            tokio::select! {
                event = client_events.next() => {
                    deadline = idle_timeout.map(|idle| Instant::now() + idle);
                    match event {
                        Some(ClientEvent::Frame(frame)) => self.on_client_message(frame),
                        Some(ClientEvent::Activity) => {}
                        Some(ClientEvent::Closed { code }) => self.on_client_closed(code),
                        Some(ClientEvent::Error(e)) => {
                            warn!(session_id = %self.session.session_id(), error = %e, "Client transport error");
                            self.on_client_closed(None);
                        }
                        None => self.on_client_closed(None),
                    }
                }

                event = upstream_events.recv() => match event {
                    Some(UpstreamEvent::Opened) => self.on_upstream_open(),
                    Some(UpstreamEvent::Message(frame)) => {
                        deadline = idle_timeout.map(|idle| Instant::now() + idle);
                        self.on_upstream_message(frame);
                    }
                    Some(UpstreamEvent::Error(e)) => self.on_upstream_error(e),
                    Some(UpstreamEvent::Closed { code, reason }) => {
                        self.on_upstream_closed(code, &reason)
                    }
                    None => self.on_upstream_gone(),
                },

                _ = idle => {
                    if let Some(idle) = idle_timeout {
                        self.on_idle(idle);
                    }
                }
            }
        }

        // A worker blocked on a full event channel must see the session
        // gone, or it never reads the close command.
        drop(upstream_events);
        self.teardown().await
    }

    /// Close both sides within the teardown bound and release the worker.
    pub async fn teardown(mut self) -> SessionSummary {
        let session_id = self.session.session_id().to_string();
        if self.session.state.is_live() {
            self.session.state = SessionState::Closing;
        }
        let cause = self.cause.take().unwrap_or(ProxyError::ClientDisconnect);
        let timeout = self.config.teardown_timeout;

        let discarded = self.session.queue.close_and_drain() as u64;
        if discarded > 0 {
            warn!(session_id = %session_id, discarded, "Discarding undelivered client frames");
            self.session.counters.discarded += discarded;
            self.metrics.frames_discarded(discarded);
        }

        // Upstream and client close run concurrently so the total stays
        // within one timeout.
        let client_close = match cause {
            ProxyError::ClientDisconnect => None,
            _ => Some(cause.close_reason()),
        };

        let link = self.upstream.as_mut();
        let upstream = async move {
            if let Some(link) = link {
                link.shutdown(timeout).await;
            }
        };
        let client_handle = &self.client;
        let reason = client_close.clone();
        let client = async move {
            match reason {
                Some(reason) => client_handle.close(reason, timeout).await,
                None => true,
            }
        };

        let ((), delivered) = tokio::join!(upstream, client);
        if !delivered {
            debug!(session_id = %session_id, "Client close frame not delivered");
        }

        self.upstream = None;
        self.session.credential = None;
        self.session.state = SessionState::Closed;

        if self.started {
            self.metrics.session_ended();
        }
        if !matches!(cause, ProxyError::ClientDisconnect) {
            self.metrics.session_failed();
        }

        let counters = self.session.counters;
        info!(
            session_id = %session_id,
            reason = cause.reason(),
            forwarded = counters.forwarded,
            relayed = counters.relayed,
            dropped = counters.dropped,
            discarded = counters.discarded,
            "Relay session closed"
        );

        SessionSummary {
            session_id,
            client_close,
            cause,
            counters,
        }
    }
}
