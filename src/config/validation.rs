//! Checks run on the merged configuration before the server starts.

use super::TlsConfig;
use crate::utils::{validate_resolver_url, validate_upstream_url};

pub(super) fn validate_upstream(upstream_url: &Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(url) = upstream_url {
        validate_upstream_url(url).map_err(|e| format!("Invalid upstream URL '{url}': {e}"))?;
    }
    Ok(())
}

pub(super) fn validate_relay_limits(
    queue_capacity: usize,
    link_buffer: usize,
    teardown_timeout_ms: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    if queue_capacity == 0 {
        return Err("relay queue_capacity must be at least 1".into());
    }
    // The whole queue is flushed into the link in one go when it opens.
    if link_buffer < queue_capacity {
        return Err(format!(
            "relay link_buffer ({link_buffer}) must be >= queue_capacity ({queue_capacity})"
        )
        .into());
    }
    if teardown_timeout_ms == 0 {
        return Err("relay teardown_timeout_ms must be greater than 0".into());
    }
    Ok(())
}

pub(super) fn validate_resolver(
    resolver_url: &Option<String>,
    resolver_token: &Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    match (resolver_url, resolver_token) {
        (Some(url), _) => {
            validate_resolver_url(url)
                .map_err(|e| format!("Invalid session resolver URL '{url}': {e}"))?;
            Ok(())
        }
        (None, Some(_)) => {
            Err("SESSION_RESOLVER_TOKEN is set but SESSION_RESOLVER_URL is not".into())
        }
        (None, None) => Ok(()),
    }
}

pub(super) fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(tls) = tls {
        if !tls.cert_path.exists() {
            return Err(format!("TLS certificate not found: {}", tls.cert_path.display()).into());
        }
        if !tls.key_path.exists() {
            return Err(format!("TLS private key not found: {}", tls.key_path.display()).into());
        }
    }
    Ok(())
}
