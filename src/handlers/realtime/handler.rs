//! Realtime relay WebSocket handler
//!
//! Upgrades the browser connection, then hands the socket to a [`Bridge`]:
//! the read half becomes the bridge's client event stream, the write half is
//! owned by a writer task fed through a bounded channel.

use axum::{
    Extension,
    extract::{
        Path, State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::core::relay::{Bridge, ClientHandle, ClientRoute, DEFAULT_CLIENT_BUFFER};
use crate::middleware::{ClientIp, ConnectionSlot};
use crate::state::AppState;

use super::messages::{client_event, outgoing_message};

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Realtime relay WebSocket handler
///
/// Serves both `/realtime/{session_id}` and `/ws/realtime/{session_id}/`.
/// The session id is resolved after the upgrade so that an unknown session
/// can be reported with a close code rather than an HTTP error.
pub async fn realtime_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
    slot: Option<Extension<ConnectionSlot>>,
) -> Response {
    info!(
        session_id = %session_id,
        ip = ?client_ip.map(|Extension(ClientIp(ip))| ip),
        "Realtime relay upgrade requested"
    );

    let slot = slot.map(|Extension(slot)| slot);
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| {
            // Correlates both halves of one connection in the logs.
            let span = info_span!("relay", connection_id = %Uuid::new_v4());
            handle_realtime_socket(socket, session_id, state, slot).instrument(span)
        })
}

/// Run one relay session on an upgraded socket.
async fn handle_realtime_socket(
    socket: WebSocket,
    session_id: String,
    app_state: Arc<AppState>,
    slot: Option<ConnectionSlot>,
) {
    // Held for the whole session; releases the connection slot on return.
    let _slot = slot;

    let (mut sender, receiver) = socket.split();
    let (client, mut routes) = ClientHandle::channel(DEFAULT_CLIENT_BUFFER);

    let writer_session_id = session_id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(route) = routes.recv().await {
            let closing = matches!(route, ClientRoute::Close(_));

            if let Err(e) = sender.send(outgoing_message(route)).await {
                debug!(session_id = %writer_session_id, error = %e, "Client write failed");
                break;
            }
            if closing {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let mut bridge = Bridge::new(
        session_id.clone(),
        client,
        app_state.relay_config.clone(),
        app_state.connector.clone(),
        app_state.metrics.clone(),
    );

    match bridge.accept(app_state.resolver.as_ref()).await {
        Ok(upstream_events) => {
            let summary = bridge
                .run(receiver.map(client_event), upstream_events)
                .await;
            debug!(session_id = %session_id, ?summary, "Relay session summary");
        }
        Err(_) => {
            // Close code already queued; dropping the bridge ends the writer.
            drop(bridge);
        }
    }

    // The writer drains once every handle is gone.
    let timeout = app_state.relay_config.teardown_timeout;
    if tokio::time::timeout(timeout, &mut writer).await.is_err() {
        warn!(session_id = %session_id, "Client writer did not finish in time, aborting");
        writer.abort();
    }
}
