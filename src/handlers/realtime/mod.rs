//! Realtime relay WebSocket endpoint
//!
//! Browsers connect to `/realtime/{session_id}` with a session id issued by
//! the surrounding application. Frames are relayed opaquely in both
//! directions:
//!
//! - **Text frames**: JSON events, forwarded verbatim
//! - **Binary frames**: forwarded as-is
//!
//! The connection is closed with an application close code when the
//! session ends abnormally (see [`crate::errors::close_codes`]).

mod handler;
pub mod messages;

pub use handler::realtime_handler;
