use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   tls:
///     enabled: true
///     cert_path: "/etc/relay/cert.pem"
///     key_path: "/etc/relay/key.pem"
///
/// upstream:
///   url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview"
///   connect_timeout_seconds: 10
///
/// relay:
///   queue_capacity: 256
///   link_buffer: 1024
///   teardown_timeout_ms: 2000
///   idle_timeout_seconds: 300
///
/// sessions:
///   ttl_seconds: 3600
///   max_entries: 10000
///   resolver_url: "https://quiz.example.com/api/realtime/sessions"
///   resolver_token: "service-token"
///   resolver_timeout_seconds: 5
///   api_secret: "registration-secret"
///
/// security:
///   cors_allowed_origins: "https://quiz.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 1000
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub upstream: Option<UpstreamYaml>,
    pub relay: Option<RelayYaml>,
    pub sessions: Option<SessionsYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Upstream realtime endpoint from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct UpstreamYaml {
    pub url: Option<String>,
    /// Model used when a session does not carry its own
    pub model: Option<String>,
    pub connect_timeout_seconds: Option<u64>,
}

/// Per-session relay tuning from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RelayYaml {
    pub queue_capacity: Option<usize>,
    pub link_buffer: Option<usize>,
    pub teardown_timeout_ms: Option<u64>,
    /// 0 disables the idle timeout
    pub idle_timeout_seconds: Option<u64>,
}

/// Session resolution settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionsYaml {
    pub ttl_seconds: Option<u64>,
    pub max_entries: Option<u64>,
    pub resolver_url: Option<String>,
    pub resolver_token: Option<String>,
    pub resolver_timeout_seconds: Option<u64>,
    pub api_secret: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080

upstream:
  url: "wss://api.openai.com/v1/realtime"
  model: "gpt-4o-realtime-preview"
  connect_timeout_seconds: 15

relay:
  queue_capacity: 64
  link_buffer: 128
  teardown_timeout_ms: 1500
  idle_timeout_seconds: 0

sessions:
  ttl_seconds: 600
  resolver_url: "https://quiz.example.com/api/realtime/sessions"
  resolver_token: "svc-token"
  api_secret: "reg-secret"

security:
  max_connections_per_ip: 5
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(server.port, Some(8080));

        let upstream = config.upstream.as_ref().unwrap();
        assert_eq!(upstream.model.as_deref(), Some("gpt-4o-realtime-preview"));
        assert_eq!(upstream.connect_timeout_seconds, Some(15));

        let relay = config.relay.as_ref().unwrap();
        assert_eq!(relay.queue_capacity, Some(64));
        assert_eq!(relay.link_buffer, Some(128));
        assert_eq!(relay.teardown_timeout_ms, Some(1500));
        assert_eq!(relay.idle_timeout_seconds, Some(0));

        let sessions = config.sessions.as_ref().unwrap();
        assert_eq!(sessions.ttl_seconds, Some(600));
        assert_eq!(sessions.resolver_token.as_deref(), Some("svc-token"));
        assert_eq!(sessions.api_secret.as_deref(), Some("reg-secret"));
        assert!(sessions.max_entries.is_none());

        assert_eq!(
            config.security.as_ref().unwrap().max_connections_per_ip,
            Some(5)
        );
    }

    #[test]
    fn test_yaml_config_partial() {
        let yaml = r#"
server:
  port: 9000
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        assert!(config.server.as_ref().unwrap().host.is_none());
        assert_eq!(config.server.as_ref().unwrap().port, Some(9000));
        assert!(config.upstream.is_none());
        assert!(config.relay.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("").unwrap();

        assert!(config.server.is_none());
        assert!(config.upstream.is_none());
        assert!(config.sessions.is_none());
        assert!(config.security.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(
            &config_path,
            r#"
server:
  host: "localhost"
  port: 3000
"#,
        )
        .unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();

        assert_eq!(
            config.server.as_ref().unwrap().host,
            Some("localhost".to_string())
        );
        assert_eq!(config.server.as_ref().unwrap().port, Some(3000));
    }

    #[test]
    fn test_from_file_not_found() {
        let path = PathBuf::from("/nonexistent/config.yaml");
        let result = YamlConfig::from_file(&path);

        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");

        fs::write(&config_path, "invalid: yaml: content:").unwrap();

        let result = YamlConfig::from_file(&config_path);

        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );
    }
}
