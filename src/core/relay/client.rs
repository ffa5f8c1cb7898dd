//! Session-side view of the browser connection.
//!
//! The socket itself is split by the HTTP handler: its read half becomes a
//! stream of [`ClientEvent`]s for the bridge, its write half is owned by a
//! writer task fed through a [`ClientHandle`].

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use super::frame::Frame;
use crate::errors::CloseReason;

/// Default capacity of the channel feeding the client writer task.
pub const DEFAULT_CLIENT_BUFFER: usize = 1024;

/// What the bridge sees arriving from the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A data frame to relay upstream
    Frame(Frame),
    /// Ping/pong traffic; keeps the session alive, relays nothing
    Activity,
    /// The browser sent a close frame
    Closed { code: Option<u16> },
    /// The client transport failed
    Error(String),
}

/// What the bridge asks the writer task to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRoute {
    Frame(Frame),
    Close(CloseReason),
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ClientSendError {
    #[error("Client writer buffer full")]
    Full,
    #[error("Client writer closed")]
    Closed,
}

/// Non-blocking handle to the client writer task.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    tx: mpsc::Sender<ClientRoute>,
}

impl ClientHandle {
    pub fn new(tx: mpsc::Sender<ClientRoute>) -> Self {
        Self { tx }
    }

    /// Create a handle plus the receiver the writer task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ClientRoute>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Queue a frame for the browser without waiting.
    pub fn send(&self, frame: Frame) -> Result<(), ClientSendError> {
        self.tx
            .try_send(ClientRoute::Frame(frame))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ClientSendError::Full,
                mpsc::error::TrySendError::Closed(_) => ClientSendError::Closed,
            })
    }

    /// Queue a close frame, waiting at most `timeout` for buffer space.
    /// Returns whether the close was handed to the writer.
    pub async fn close(&self, reason: CloseReason, timeout: Duration) -> bool {
        self.tx
            .send_timeout(ClientRoute::Close(reason), timeout)
            .await
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_reports_full_and_closed() {
        let (client, mut rx) = ClientHandle::channel(1);
        client.send(Frame::text("one")).unwrap();
        assert_eq!(client.send(Frame::text("two")), Err(ClientSendError::Full));

        assert_eq!(rx.recv().await, Some(ClientRoute::Frame(Frame::text("one"))));
        drop(rx);
        assert_eq!(client.send(Frame::text("three")), Err(ClientSendError::Closed));
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn test_close_gives_up_after_timeout() {
        let (client, _rx) = ClientHandle::channel(1);
        client.send(Frame::text("fill")).unwrap();
        assert!(
            !client
                .close(CloseReason::normal(), Duration::from_millis(20))
                .await
        );
    }
}
