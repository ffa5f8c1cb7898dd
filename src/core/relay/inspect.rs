//! Best-effort inspection of relayed JSON frames for logging.
//!
//! Frames are relayed verbatim whether or not they parse. Only the `type`
//! field and, for a few upstream events, their status details are read.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, trace};

use super::frame::{Direction, RelayedMessage};

/// Client control events logged at `info`.
pub const NOTABLE_CLIENT_EVENTS: &[&str] = &[
    "response.create",
    "session.update",
    "input_audio_buffer.commit",
];

/// Upstream events too chatty to log even at `debug`.
const QUIET_UPSTREAM_EVENTS: &[&str] = &[
    "conversation.item.added",
    "conversation.item.done",
    "response.output_audio.delta",
    "response.audio.delta",
];

#[derive(Debug, Default, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    event_type: Option<String>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    response: Option<ResponseSummary>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseSummary {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    status_details: Option<Value>,
    #[serde(default)]
    output: Option<Vec<Value>>,
}

/// Log a relayed frame at a level matching its significance.
pub fn log_frame(session_id: &str, message: &RelayedMessage) {
    let RelayedMessage { direction, frame } = message;
    let Some(text) = frame.as_text() else {
        trace!(session_id = %session_id, %direction, bytes = frame.len(), "Binary frame");
        return;
    };

    let envelope = match serde_json::from_str::<EventEnvelope>(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(session_id = %session_id, %direction, error = %e, "Relaying non-JSON text frame");
            return;
        }
    };
    let event_type = envelope.event_type.as_deref().unwrap_or("unknown");

    match direction {
        Direction::ClientToUpstream => {
            if NOTABLE_CLIENT_EVENTS.contains(&event_type) {
                info!(session_id = %session_id, event_type, "Client event");
            } else {
                debug!(session_id = %session_id, event_type, "Client event");
            }
        }
        Direction::UpstreamToClient => log_upstream_event(session_id, event_type, &envelope),
    }
}

fn log_upstream_event(session_id: &str, event_type: &str, envelope: &EventEnvelope) {
    match event_type {
        "error" => {
            let detail = envelope
                .error
                .as_ref()
                .map(serde_json::Value::to_string)
                .unwrap_or_default();
            error!(session_id = %session_id, error = %detail, "Upstream reported an error");
        }
        "response.created" => info!(session_id = %session_id, "Upstream response started"),
        "response.done" => {
            let response = envelope.response.as_ref();
            let status = response
                .and_then(|r| r.status.as_deref())
                .unwrap_or("unknown");
            let outputs = response
                .and_then(|r| r.output.as_ref())
                .map(Vec::len)
                .unwrap_or(0);

            if status == "failed" {
                let details = response.and_then(|r| r.status_details.as_ref());
                let err = details.and_then(|d| d.get("error"));
                let field = |name: &str| {
                    err.and_then(|e| e.get(name))
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string()
                };
                error!(
                    session_id = %session_id,
                    error_type = %field("type"),
                    error_code = %field("code"),
                    error_message = %field("message"),
                    "Upstream response failed"
                );
            } else {
                info!(session_id = %session_id, status, outputs, "Upstream response done");
            }
        }
        t if QUIET_UPSTREAM_EVENTS.contains(&t) => {
            trace!(session_id = %session_id, event_type = t, "Upstream event");
        }
        t => debug!(session_id = %session_id, event_type = t, "Upstream event"),
    }
}
