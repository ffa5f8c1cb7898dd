//! Shared helpers for the integration tests: a scriptable mock upstream
//! realtime endpoint and an in-process relay server.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use realtime_relay::config::ServerConfig;
use realtime_relay::core::session::ResolvedSession;
use realtime_relay::routes::build_router;
use realtime_relay::state::AppState;

pub type TestClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TEST_CREDENTIAL: &str = "ek_test_secret";
pub const TEST_MODEL: &str = "gpt-realtime";
pub const TEST_API_SECRET: &str = "relay-admin-secret";

/// How the mock upstream behaves once a connection arrives.
#[derive(Debug, Clone, Copy)]
pub enum UpstreamBehavior {
    /// Echo every data frame back.
    Echo,
    /// Wait before completing the handshake, then echo.
    DelayedEcho(Duration),
    /// Send one greeting frame, then drop the TCP connection.
    GreetThenDrop,
    /// Stream text frames as fast as possible until the relay closes.
    Flood,
    /// Send one ping, then report every pong on `received` as `pong:<payload>`.
    Heartbeat,
}

/// How a relay connection ended, as seen by the mock upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEnd {
    /// The relay sent a close frame with this code.
    CloseFrame(Option<u16>),
    /// The transport failed without a close frame.
    Error(String),
    /// The stream ended without a close frame.
    Dropped,
}

/// What the mock upstream saw during the handshake.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub uri: String,
    pub authorization: Option<String>,
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    /// Handshakes in arrival order.
    pub handshakes: mpsc::UnboundedReceiver<Handshake>,
    /// Text frames received from the relay.
    pub received: mpsc::UnboundedReceiver<String>,
    /// How each relay connection ended.
    pub ends: mpsc::UnboundedReceiver<UpstreamEnd>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("ws://{}/v1/realtime", self.addr)
    }
}

/// Start a mock upstream on an ephemeral port.
///
/// Handshakes without `Authorization: Bearer TEST_CREDENTIAL` are rejected
/// with 401.
pub async fn start_mock_upstream(behavior: UpstreamBehavior) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (handshake_tx, handshakes) = mpsc::unbounded_channel();
    let (received_tx, received) = mpsc::unbounded_channel();
    let (ends_tx, ends) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handshake_tx = handshake_tx.clone();
            let received_tx = received_tx.clone();
            let ends_tx = ends_tx.clone();
            tokio::spawn(serve_upstream(
                stream,
                behavior,
                handshake_tx,
                received_tx,
                ends_tx,
            ));
        }
    });

    MockUpstream {
        addr,
        handshakes,
        received,
        ends,
    }
}

async fn serve_upstream(
    stream: TcpStream,
    behavior: UpstreamBehavior,
    handshake_tx: mpsc::UnboundedSender<Handshake>,
    received_tx: mpsc::UnboundedSender<String>,
    ends_tx: mpsc::UnboundedSender<UpstreamEnd>,
) {
    if let UpstreamBehavior::DelayedEcho(delay) = behavior {
        tokio::time::sleep(delay).await;
    }

    let expected = format!("Bearer {TEST_CREDENTIAL}");
    let callback = |request: &Request, response: Response| {
        let authorization = request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let _ = handshake_tx.send(Handshake {
            uri: request.uri().to_string(),
            authorization: authorization.clone(),
        });

        if authorization.as_deref() == Some(expected.as_str()) {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("unauthorized".to_string()));
            *rejection.status_mut() = StatusCode::UNAUTHORIZED;
            Err(rejection)
        }
    };

    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };

    if let UpstreamBehavior::GreetThenDrop = behavior {
        let _ = ws
            .send(Message::text(r#"{"type":"session.created"}"#))
            .await;
        // Drop without a close handshake.
        return;
    }

    if let UpstreamBehavior::Flood = behavior {
        let (mut sink, mut stream) = ws.split();
        tokio::spawn(async move {
            let delta = r#"{"type":"response.output_audio.delta","delta":"AAAA"}"#;
            while sink.send(Message::text(delta)).await.is_ok() {}
        });
        let _ = ends_tx.send(watch_for_close(&mut stream).await);
        return;
    }

    if let UpstreamBehavior::Heartbeat = behavior {
        let _ = ws.send(Message::Ping("hb".into())).await;
    }

    let end = loop {
        match ws.next().await {
            Some(Ok(Message::Pong(payload))) => {
                let _ = received_tx.send(format!("pong:{}", String::from_utf8_lossy(&payload)));
            }
            Some(Ok(Message::Text(text))) => {
                let _ = received_tx.send(text.to_string());
                if let Err(e) = ws.send(Message::Text(text)).await {
                    break UpstreamEnd::Error(e.to_string());
                }
            }
            Some(Ok(Message::Binary(data))) => {
                if let Err(e) = ws.send(Message::Binary(data)).await {
                    break UpstreamEnd::Error(e.to_string());
                }
            }
            Some(Ok(Message::Close(frame))) => {
                break UpstreamEnd::CloseFrame(frame.map(|f| u16::from(f.code)));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break UpstreamEnd::Error(e.to_string()),
            None => break UpstreamEnd::Dropped,
        }
    };
    let _ = ends_tx.send(end);
}

async fn watch_for_close<S>(stream: &mut S) -> UpstreamEnd
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Close(frame))) => {
                return UpstreamEnd::CloseFrame(frame.map(|f| u16::from(f.code)));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return UpstreamEnd::Error(e.to_string()),
            None => return UpstreamEnd::Dropped,
        }
    }
}

/// A relay configuration suitable for tests.
pub fn test_config(upstream_url: Option<String>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        upstream_url,
        upstream_model: Some(TEST_MODEL.to_string()),
        upstream_connect_timeout_seconds: 5,
        relay_queue_capacity: 16,
        relay_link_buffer: 64,
        relay_teardown_timeout_ms: 1000,
        relay_idle_timeout_seconds: 0,
        session_ttl_seconds: 60,
        session_max_entries: 100,
        session_resolver_url: None,
        session_resolver_token: None,
        session_resolver_timeout_seconds: 5,
        api_secret: Some(TEST_API_SECRET.to_string()),
        cors_allowed_origins: None,
        rate_limit_requests_per_second: 60,
        rate_limit_burst_size: 10,
        max_websocket_connections: None,
        max_connections_per_ip: 100,
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
}

impl TestServer {
    pub fn ws_url(&self, session_id: &str) -> String {
        format!("ws://{}/realtime/{}", self.addr, session_id)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Register a session directly with the in-memory store.
    pub async fn register(&self, session_id: &str) {
        self.state
            .resolver
            .register(session_id, ResolvedSession::new(TEST_CREDENTIAL))
            .await
            .unwrap();
    }
}

/// Serve the full router on an ephemeral port.
pub async fn start_relay(config: ServerConfig) -> TestServer {
    let state = AppState::new(config).unwrap();
    let app = build_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer { addr, state }
}

pub async fn connect_client(url: &str) -> TestClient {
    let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    ws
}

/// Next text frame from the relay, failing the test after five seconds.
pub async fn next_text(client: &mut TestClient) -> String {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        match message {
            Message::Text(text) => return text.to_string(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

/// Wait for the relay's close frame and return its code.
pub async fn expect_close(client: &mut TestClient) -> u16 {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for close");
        match next {
            Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
            Some(Ok(Message::Close(None))) => panic!("close frame without a code"),
            Some(Ok(_)) => continue,
            Some(Err(e)) => panic!("websocket error before close: {e}"),
            None => panic!("stream ended without a close frame"),
        }
    }
}
