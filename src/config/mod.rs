//! Configuration module for the realtime relay
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable parsing
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use realtime_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use subtle::ConstantTimeEq;

use crate::core::relay::RelayConfig;

mod env;
mod merge;
mod validation;
mod yaml;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_UPSTREAM_URL: &str = "wss://api.openai.com/v1/realtime";
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = crate::core::relay::DEFAULT_QUEUE_CAPACITY;
pub const DEFAULT_LINK_BUFFER: usize = crate::core::relay::DEFAULT_LINK_BUFFER;
pub const DEFAULT_TEARDOWN_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 3600;
pub const DEFAULT_MAX_SESSIONS: u64 = 10_000;
pub const DEFAULT_RESOLVER_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_RATE_LIMIT_RPS: u32 = 60;
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 10;
pub const DEFAULT_MAX_CONNECTIONS_PER_IP: u32 = 100;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains everything needed to run the relay:
/// - Server settings (host, port, TLS)
/// - Upstream realtime endpoint and default model
/// - Per-session relay tuning (queue, buffers, timeouts)
/// - Session resolution (in-memory store TTL or HTTP resolver)
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Upstream realtime endpoint
    pub upstream_url: Option<String>,
    /// Model used when the session record does not carry one
    pub upstream_model: Option<String>,
    pub upstream_connect_timeout_seconds: u64,

    // Relay tuning
    /// Client frames buffered per session before the upstream opens
    pub relay_queue_capacity: usize,
    /// Frames buffered between a session and its upstream worker
    pub relay_link_buffer: usize,
    pub relay_teardown_timeout_ms: u64,
    /// 0 disables the idle timeout
    pub relay_idle_timeout_seconds: u64,

    // Session resolution
    pub session_ttl_seconds: u64,
    pub session_max_entries: u64,
    /// When set, sessions are looked up over HTTP instead of the in-memory store
    pub session_resolver_url: Option<String>,
    pub session_resolver_token: Option<String>,
    pub session_resolver_timeout_seconds: u64,
    /// Bearer secret guarding the session registration endpoints
    pub api_secret: Option<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: u32,
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    pub max_connections_per_ip: u32,
}

/// Zeroize secret fields when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut token) = self.session_resolver_token {
            token.zeroize();
        }
        if let Some(ref mut secret) = self.api_secret {
            secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// Missing values fall back to defaults. The result is validated.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // Note: .env file is loaded in main.rs at application startup
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validation::validate_tls(&self.tls)?;
        validation::validate_upstream(&self.upstream_url)?;
        validation::validate_relay_limits(
            self.relay_queue_capacity,
            self.relay_link_buffer,
            self.relay_teardown_timeout_ms,
        )?;
        validation::validate_resolver(&self.session_resolver_url, &self.session_resolver_token)?;
        Ok(())
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Check if the session registration endpoints are enabled
    pub fn has_api_secret(&self) -> bool {
        self.api_secret.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Compare a bearer token against the registration secret in constant time
    pub fn api_secret_matches(&self, token: &str) -> bool {
        match self.api_secret.as_deref() {
            Some(secret) if !secret.is_empty() => {
                bool::from(secret.as_bytes().ct_eq(token.as_bytes()))
            }
            _ => false,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout_seconds)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_secs(self.session_resolver_timeout_seconds)
    }

    /// Per-session relay settings derived from this configuration
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            upstream_url: self.upstream_url.clone(),
            default_model: self.upstream_model.clone(),
            queue_capacity: self.relay_queue_capacity,
            event_buffer: self.relay_link_buffer,
            teardown_timeout: Duration::from_millis(self.relay_teardown_timeout_ms),
            idle_timeout: (self.relay_idle_timeout_seconds > 0)
                .then(|| Duration::from_secs(self.relay_idle_timeout_seconds)),
        }
    }
}
