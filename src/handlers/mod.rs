//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check, relay stats and session registration
//! - `realtime` - The realtime relay WebSocket endpoint

pub mod api;
pub mod realtime;

pub use realtime::realtime_handler;
