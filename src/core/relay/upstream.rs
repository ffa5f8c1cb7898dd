//! Upstream link to the third-party realtime endpoint.
//!
//! Each link owns exactly one WebSocket connection, driven by its own worker
//! task. The worker never touches relay session state: it reports
//! [`UpstreamEvent`]s over a channel that the session task drains, and takes
//! [`LinkCommand`]s from the [`UpstreamLink`] handle.
//!
//! ```text
//!   session task                      worker task
//!   ------------                      -----------
//!   UpstreamLink::send ──commands──▶  sink.send(frame)
//!   UpstreamLink::close ─commands──▶  close handshake, exit
//!   bridge.on_upstream_* ◀─events───  Opened / Message / Error / Closed
//! ```
//!
//! There is no reconnection: once a link has failed the session is over.

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use http::{HeaderValue, header::AUTHORIZATION};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{
    Message,
    client::IntoClientRequest,
    protocol::{CloseFrame, frame::coding::CloseCode},
};
use tracing::{debug, error, info, warn};
use url::Url;

use super::frame::Frame;
use crate::core::session::UpstreamCredential;

/// Default bound on the TCP + TLS + WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of frames buffered between the session and the worker.
pub const DEFAULT_LINK_BUFFER: usize = 1024;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// `send` was called before the link reported open
    #[error("Upstream link is not open yet")]
    NotOpen,

    /// `send` was called after the link closed
    #[error("Upstream link is closed")]
    Closed,

    /// The worker is not draining frames fast enough
    #[error("Upstream link buffer full (capacity {capacity})")]
    Backpressure { capacity: usize },

    /// Endpoint URL or credential could not be turned into a request
    #[error("Invalid upstream target: {0}")]
    InvalidTarget(String),
}

/// Where and how to open one upstream link.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    url: Url,
    credential: UpstreamCredential,
    model: String,
}

impl UpstreamTarget {
    /// Build a target from the configured endpoint, the session model and
    /// the session credential. The model is sent as the `model` query
    /// parameter; the credential as a bearer token.
    pub fn new(
        endpoint: &str,
        model: &str,
        credential: UpstreamCredential,
    ) -> Result<Self, UpstreamError> {
        let mut url =
            Url::parse(endpoint).map_err(|e| UpstreamError::InvalidTarget(e.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(UpstreamError::InvalidTarget(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }
        if credential.is_empty() {
            return Err(UpstreamError::InvalidTarget("empty credential".to_string()));
        }
        if !model.is_empty() {
            url.query_pairs_mut().append_pair("model", model);
        }
        Ok(Self {
            url,
            credential,
            model: model.to_string(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_request(
        &self,
    ) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, UpstreamError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| UpstreamError::InvalidTarget(e.to_string()))?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.credential.expose()))
            .map_err(|_| UpstreamError::InvalidTarget("credential is not a valid header".into()))?;
        auth.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, auth);
        Ok(request)
    }
}

/// Signals posted by the worker back to the session task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// Handshake complete; sends are now allowed
    Opened,
    /// A frame from the upstream, in upstream order
    Message(Frame),
    /// Transport or handshake failure; always followed by `Closed`
    Error(String),
    /// The connection is gone
    Closed { code: Option<u16>, reason: String },
}

/// Commands from the session to the worker.
#[derive(Debug)]
pub enum LinkCommand {
    Send(Frame),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Pending,
    Open,
    Closed,
}

/// Session-side handle to one upstream link.
///
/// The handle enforces the send-after-open rule itself: frames are refused
/// with [`UpstreamError::NotOpen`] until [`mark_open`](Self::mark_open) is
/// called in response to [`UpstreamEvent::Opened`].
#[derive(Debug)]
pub struct UpstreamLink {
    commands: mpsc::Sender<LinkCommand>,
    capacity: usize,
    state: LinkState,
    worker: Option<JoinHandle<()>>,
}

impl UpstreamLink {
    /// Wrap a command channel and, optionally, the worker driving it.
    pub fn new(commands: mpsc::Sender<LinkCommand>, worker: Option<JoinHandle<()>>) -> Self {
        let capacity = commands.max_capacity();
        Self {
            commands,
            capacity,
            state: LinkState::Pending,
            worker,
        }
    }

    /// Record that the worker reported `Opened`. Returns false if the link
    /// was already closed.
    pub fn mark_open(&mut self) -> bool {
        match self.state {
            LinkState::Pending => {
                self.state = LinkState::Open;
                true
            }
            LinkState::Open => true,
            LinkState::Closed => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == LinkState::Closed
    }

    /// Hand a frame to the worker without waiting.
    pub fn send(&mut self, frame: Frame) -> Result<(), UpstreamError> {
        match self.state {
            LinkState::Pending => return Err(UpstreamError::NotOpen),
            LinkState::Closed => return Err(UpstreamError::Closed),
            LinkState::Open => {}
        }

        self.commands
            .try_send(LinkCommand::Send(frame))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => UpstreamError::Backpressure {
                    capacity: self.capacity,
                },
                mpsc::error::TrySendError::Closed(_) => UpstreamError::Closed,
            })
    }

    /// Ask the worker to close. Idempotent and safe before open.
    pub fn close(&mut self) {
        if self.state == LinkState::Closed {
            return;
        }
        self.state = LinkState::Closed;
        if self.commands.try_send(LinkCommand::Close).is_err() {
            // Buffer full or worker gone; shutdown() aborts it if needed.
            debug!("Upstream close command not delivered");
        }
    }

    /// Close the link and wait up to `timeout` for the worker to finish.
    ///
    /// A worker still running after `timeout` is aborted. Returns whether the
    /// worker finished on its own.
    pub async fn shutdown(&mut self, timeout: Duration) -> bool {
        self.close();
        let Some(mut worker) = self.worker.take() else {
            return true;
        };

        match tokio::time::timeout(timeout, &mut worker).await {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Upstream worker did not stop in time, aborting"
                );
                worker.abort();
                false
            }
        }
    }
}

impl Drop for UpstreamLink {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

/// Opens upstream links.
///
/// `open` returns immediately; the outcome arrives later on `events`.
pub trait UpstreamConnector: Send + Sync {
    fn open(&self, target: UpstreamTarget, events: mpsc::Sender<UpstreamEvent>) -> UpstreamLink;
}

/// Connector backed by `tokio-tungstenite`, one spawned worker per link.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
    link_buffer: usize,
}

impl WebSocketConnector {
    pub fn new(connect_timeout: Duration, link_buffer: usize) -> Self {
        Self {
            connect_timeout,
            link_buffer: link_buffer.max(1),
        }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT, DEFAULT_LINK_BUFFER)
    }
}

impl UpstreamConnector for WebSocketConnector {
    fn open(&self, target: UpstreamTarget, events: mpsc::Sender<UpstreamEvent>) -> UpstreamLink {
        let (tx, rx) = mpsc::channel(self.link_buffer);
        let worker = tokio::spawn(run_link_worker(target, rx, events, self.connect_timeout));
        UpstreamLink::new(tx, Some(worker))
    }
}

fn to_ws_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data),
    }
}

/// Send a normal close frame and flush it. Errors are ignored: the peer may
/// already be gone.
async fn close_gracefully<S>(sink: &mut S)
where
    S: Sink<Message> + Unpin,
{
    let _ = sink
        .send(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        })))
        .await;
    let _ = sink.close().await;
}

/// Report a failure without blocking; the session may already be gone.
fn report_failure(events: &mpsc::Sender<UpstreamEvent>, message: String, code: Option<u16>) {
    let _ = events.try_send(UpstreamEvent::Error(message.clone()));
    let _ = events.try_send(UpstreamEvent::Closed {
        code,
        reason: message,
    });
}

async fn run_link_worker(
    target: UpstreamTarget,
    mut commands: mpsc::Receiver<LinkCommand>,
    events: mpsc::Sender<UpstreamEvent>,
    connect_timeout: Duration,
) {
    let request = match target.to_request() {
        Ok(request) => request,
        Err(e) => {
            report_failure(&events, e.to_string(), None);
            return;
        }
    };

    info!(
        host = target.url.host_str().unwrap_or_default(),
        model = %target.model,
        credential = %target.credential,
        "Connecting upstream realtime link"
    );

    let connect = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(request));
    let ws_stream = tokio::select! {
        result = connect => match result {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(e)) => {
                warn!(error = %e, "Upstream handshake failed");
                report_failure(&events, format!("handshake failed: {e}"), None);
                return;
            }
            Err(_) => {
                warn!(timeout_secs = connect_timeout.as_secs(), "Upstream handshake timed out");
                report_failure(
                    &events,
                    format!("handshake timed out after {}s", connect_timeout.as_secs()),
                    None,
                );
                return;
            }
        },
        // Sends are refused before open, so anything here means close.
        _ = commands.recv() => {
            debug!("Upstream link closed before handshake completed");
            let _ = events.try_send(UpstreamEvent::Closed {
                code: None,
                reason: "closed before open".to_string(),
            });
            return;
        }
    };

    if events.send(UpstreamEvent::Opened).await.is_err() {
        debug!("Relay session gone before upstream opened");
        return;
    }

    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LinkCommand::Send(frame)) => {
                    if let Err(e) = sink.send(to_ws_message(frame)).await {
                        error!(error = %e, "Failed to write to upstream");
                        report_failure(&events, format!("write failed: {e}"), None);
                        return;
                    }
                }
                Some(LinkCommand::Close) | None => {
                    debug!("Closing upstream link");
                    close_gracefully(&mut sink).await;
                    let _ = events.try_send(UpstreamEvent::Closed {
                        code: Some(1000),
                        reason: "closed by relay".to_string(),
                    });
                    return;
                }
            },

            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let frame = Frame::Text(text.as_str().to_owned());
                    if events.send(UpstreamEvent::Message(frame)).await.is_err() {
                        debug!("Relay session gone, stopping upstream worker");
                        close_gracefully(&mut sink).await;
                        return;
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    if events.send(UpstreamEvent::Message(Frame::Binary(data))).await.is_err() {
                        debug!("Relay session gone, stopping upstream worker");
                        close_gracefully(&mut sink).await;
                        return;
                    }
                }
                // tungstenite queues the pong and flushes it on the next write.
                Some(Ok(Message::Ping(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.as_str().to_owned()))
                        .unwrap_or((None, String::new()));
                    info!(?code, reason = %reason, "Upstream closed the link");
                    let _ = events.try_send(UpstreamEvent::Closed { code, reason });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "Upstream transport error");
                    report_failure(&events, e.to_string(), None);
                    return;
                }
                None => {
                    info!("Upstream stream ended");
                    let _ = events.try_send(UpstreamEvent::Closed {
                        code: None,
                        reason: "stream ended".to_string(),
                    });
                    return;
                }
            },
        }
    }
}
