//! Merge environment variables with optional YAML overrides.
//!
//! Priority per key: YAML > ENV > default.

use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{
    DEFAULT_CONNECT_TIMEOUT_SECONDS, DEFAULT_HOST, DEFAULT_IDLE_TIMEOUT_SECONDS,
    DEFAULT_LINK_BUFFER, DEFAULT_MAX_CONNECTIONS_PER_IP, DEFAULT_MAX_SESSIONS, DEFAULT_PORT,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_RATE_LIMIT_BURST, DEFAULT_RATE_LIMIT_RPS,
    DEFAULT_RESOLVER_TIMEOUT_SECONDS, DEFAULT_SESSION_TTL_SECONDS, DEFAULT_TEARDOWN_TIMEOUT_MS,
    DEFAULT_UPSTREAM_URL, ServerConfig, TlsConfig, env,
};

pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml.unwrap_or_default();
    let server = yaml.server.unwrap_or_default();
    let tls_yaml = server.tls.unwrap_or_default();
    let upstream = yaml.upstream.unwrap_or_default();
    let relay = yaml.relay.unwrap_or_default();
    let sessions = yaml.sessions.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let host = server
        .host
        .or_else(|| env::var("HOST"))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = match server.port {
        Some(port) => port,
        None => env::parse("PORT")?.unwrap_or(DEFAULT_PORT),
    };

    let tls_enabled = match tls_yaml.enabled {
        Some(enabled) => enabled,
        None => env::parse_bool("TLS_ENABLED")?.unwrap_or(false),
    };
    let tls = if tls_enabled {
        let cert_path = tls_yaml
            .cert_path
            .or_else(|| env::var("TLS_CERT_PATH"))
            .ok_or("TLS is enabled but TLS_CERT_PATH / server.tls.cert_path is not set")?;
        let key_path = tls_yaml
            .key_path
            .or_else(|| env::var("TLS_KEY_PATH"))
            .ok_or("TLS is enabled but TLS_KEY_PATH / server.tls.key_path is not set")?;
        Some(TlsConfig {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        })
    } else {
        None
    };

    let upstream_url = upstream
        .url
        .or_else(|| env::var("UPSTREAM_URL"))
        .or_else(|| Some(DEFAULT_UPSTREAM_URL.to_string()));
    let upstream_model = upstream.model.or_else(|| env::var("UPSTREAM_MODEL"));
    let upstream_connect_timeout_seconds = match upstream.connect_timeout_seconds {
        Some(value) => value,
        None => env::parse("UPSTREAM_CONNECT_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECONDS),
    };

    let relay_queue_capacity = match relay.queue_capacity {
        Some(value) => value,
        None => env::parse("RELAY_QUEUE_CAPACITY")?.unwrap_or(DEFAULT_QUEUE_CAPACITY),
    };
    let relay_link_buffer = match relay.link_buffer {
        Some(value) => value,
        None => env::parse("RELAY_LINK_BUFFER")?.unwrap_or(DEFAULT_LINK_BUFFER),
    };
    let relay_teardown_timeout_ms = match relay.teardown_timeout_ms {
        Some(value) => value,
        None => env::parse("RELAY_TEARDOWN_TIMEOUT_MS")?.unwrap_or(DEFAULT_TEARDOWN_TIMEOUT_MS),
    };
    let relay_idle_timeout_seconds = match relay.idle_timeout_seconds {
        Some(value) => value,
        None => env::parse("RELAY_IDLE_TIMEOUT_SECONDS")?.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECONDS),
    };

    let session_ttl_seconds = match sessions.ttl_seconds {
        Some(value) => value,
        None => env::parse("SESSION_TTL_SECONDS")?.unwrap_or(DEFAULT_SESSION_TTL_SECONDS),
    };
    let session_max_entries = match sessions.max_entries {
        Some(value) => value,
        None => env::parse("SESSION_MAX_ENTRIES")?.unwrap_or(DEFAULT_MAX_SESSIONS),
    };
    let session_resolver_url = sessions
        .resolver_url
        .or_else(|| env::var("SESSION_RESOLVER_URL"));
    let session_resolver_token = sessions
        .resolver_token
        .or_else(|| env::var("SESSION_RESOLVER_TOKEN"));
    let session_resolver_timeout_seconds = match sessions.resolver_timeout_seconds {
        Some(value) => value,
        None => env::parse("SESSION_RESOLVER_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_RESOLVER_TIMEOUT_SECONDS),
    };
    let api_secret = sessions.api_secret.or_else(|| env::var("RELAY_API_SECRET"));

    let cors_allowed_origins = security
        .cors_allowed_origins
        .or_else(|| env::var("CORS_ALLOWED_ORIGINS"));
    let rate_limit_requests_per_second = match security.rate_limit_requests_per_second {
        Some(value) => value,
        None => env::parse("RATE_LIMIT_REQUESTS_PER_SECOND")?.unwrap_or(DEFAULT_RATE_LIMIT_RPS),
    };
    let rate_limit_burst_size = match security.rate_limit_burst_size {
        Some(value) => value,
        None => env::parse("RATE_LIMIT_BURST_SIZE")?.unwrap_or(DEFAULT_RATE_LIMIT_BURST),
    };
    let max_websocket_connections = match security.max_websocket_connections {
        Some(value) => Some(value),
        None => env::parse("MAX_WEBSOCKET_CONNECTIONS")?,
    };
    let max_connections_per_ip = match security.max_connections_per_ip {
        Some(value) => value,
        None => env::parse("MAX_CONNECTIONS_PER_IP")?.unwrap_or(DEFAULT_MAX_CONNECTIONS_PER_IP),
    };

    Ok(ServerConfig {
        host,
        port,
        tls,
        upstream_url,
        upstream_model,
        upstream_connect_timeout_seconds,
        relay_queue_capacity,
        relay_link_buffer,
        relay_teardown_timeout_ms,
        relay_idle_timeout_seconds,
        session_ttl_seconds,
        session_max_entries,
        session_resolver_url,
        session_resolver_token,
        session_resolver_timeout_seconds,
        api_secret,
        cors_allowed_origins,
        rate_limit_requests_per_second,
        rate_limit_burst_size,
        max_websocket_connections,
        max_connections_per_ip,
    })
}
