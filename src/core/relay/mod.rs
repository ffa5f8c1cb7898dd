//! Realtime relay core.
//!
//! - [`Bridge`] - per-session state machine pairing one browser socket with
//!   one upstream link
//! - [`UpstreamLink`] / [`WebSocketConnector`] - the upstream side, driven by
//!   a dedicated worker task
//! - [`OutboundQueue`] - client frames held until the upstream opens
//! - [`RelayMetrics`] - process-wide counters

mod bridge;
mod client;
mod frame;
mod inspect;
mod metrics;
mod queue;
mod session;
mod upstream;

pub use bridge::{Bridge, DEFAULT_TEARDOWN_TIMEOUT, RelayConfig, SessionSummary};
pub use client::{
    ClientEvent, ClientHandle, ClientRoute, ClientSendError, DEFAULT_CLIENT_BUFFER,
};
pub use frame::{Direction, Frame, RelayedMessage};
pub use inspect::{NOTABLE_CLIENT_EVENTS, log_frame};
pub use metrics::{RelayMetrics, RelayMetricsSnapshot};
pub use queue::{DEFAULT_QUEUE_CAPACITY, OutboundQueue, QueueError};
pub use session::{ProxySession, SessionCounters, SessionState};
pub use upstream::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_LINK_BUFFER, LinkCommand, UpstreamConnector, UpstreamError,
    UpstreamEvent, UpstreamLink, UpstreamTarget, WebSocketConnector,
};
