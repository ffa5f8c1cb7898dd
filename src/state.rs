//! Shared application state.
//!
//! One [`AppState`] is built at startup and shared by every handler through
//! an `Arc`. Apart from the relay metrics and the connection counters it is
//! read-only; per-session state lives in each session's bridge.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::relay::{RelayConfig, RelayMetrics, UpstreamConnector, WebSocketConnector};
use crate::core::session::{
    HttpSessionResolver, InMemorySessionStore, ResolveError, SessionResolver,
};

/// Why a WebSocket upgrade was refused.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ConnectionLimitError {
    #[error("global WebSocket connection limit reached")]
    GlobalLimitReached,
    #[error("per-IP connection limit reached")]
    PerIpLimitReached,
}

pub struct AppState {
    pub config: ServerConfig,
    pub relay_config: Arc<RelayConfig>,
    pub resolver: Arc<dyn SessionResolver>,
    pub connector: Arc<dyn UpstreamConnector>,
    pub metrics: Arc<RelayMetrics>,
    ws_connections: AtomicUsize,
    ip_connections: Mutex<HashMap<IpAddr, u32>>,
}

impl AppState {
    /// Build the state from configuration, choosing the session resolver:
    /// the HTTP resolver when `session_resolver_url` is set, otherwise the
    /// in-memory store fed by the registration endpoints.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, ResolveError> {
        let resolver: Arc<dyn SessionResolver> = match config.session_resolver_url.as_deref() {
            Some(url) => {
                info!(url = %url, "Using HTTP session resolver");
                Arc::new(HttpSessionResolver::new(
                    url,
                    config.session_resolver_token.clone(),
                    config.resolver_timeout(),
                )?)
            }
            None => {
                info!(
                    ttl_seconds = config.session_ttl_seconds,
                    max_entries = config.session_max_entries,
                    "Using in-memory session store"
                );
                Arc::new(InMemorySessionStore::with_capacity(
                    config.session_ttl(),
                    config.session_max_entries,
                ))
            }
        };

        let connector: Arc<dyn UpstreamConnector> = Arc::new(WebSocketConnector::new(
            config.connect_timeout(),
            config.relay_link_buffer,
        ));

        Ok(Self::with_parts(config, resolver, connector))
    }

    /// Build the state around an explicit resolver and connector.
    pub fn with_parts(
        config: ServerConfig,
        resolver: Arc<dyn SessionResolver>,
        connector: Arc<dyn UpstreamConnector>,
    ) -> Arc<Self> {
        let relay_config = Arc::new(config.relay_config());
        Arc::new(Self {
            config,
            relay_config,
            resolver,
            connector,
            metrics: Arc::new(RelayMetrics::new()),
            ws_connections: AtomicUsize::new(0),
            ip_connections: Mutex::new(HashMap::new()),
        })
    }

    /// Reserve a WebSocket slot for `ip`, enforcing the global and per-IP
    /// limits. Every successful call must be paired with
    /// [`release_connection`](Self::release_connection).
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        // The per-IP map lock also serializes the global check.
        let mut per_ip = self.ip_connections.lock();

        if let Some(max) = self.config.max_websocket_connections {
            if self.ws_connections.load(Ordering::Acquire) >= max {
                return Err(ConnectionLimitError::GlobalLimitReached);
            }
        }

        let count = per_ip.entry(ip).or_insert(0);
        if *count >= self.config.max_connections_per_ip {
            if *count == 0 {
                per_ip.remove(&ip);
            }
            return Err(ConnectionLimitError::PerIpLimitReached);
        }

        *count += 1;
        self.ws_connections.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn release_connection(&self, ip: IpAddr) {
        let mut per_ip = self.ip_connections.lock();
        if let Some(count) = per_ip.get_mut(&ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                per_ip.remove(&ip);
            }
            let _ = self
                .ws_connections
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    Some(n.saturating_sub(1))
                });
        }
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.lock().get(ip).copied().unwrap_or(0)
    }
}

/// Releases a reserved connection slot when dropped.
pub struct ConnectionGuard {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl ConnectionGuard {
    pub fn new(state: Arc<AppState>, ip: IpAddr) -> Self {
        Self { state, ip }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.release_connection(self.ip);
    }
}
