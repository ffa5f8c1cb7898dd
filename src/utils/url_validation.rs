//! Validation for operator-supplied endpoint URLs.
//!
//! Both endpoints the relay talks to come from configuration, so these checks
//! catch typos at startup instead of on the first session:
//! - the upstream realtime endpoint must be `ws://` or `wss://` with a host
//! - the session resolver endpoint must be `http://` or `https://` with a host

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("Unsupported URL scheme '{found}', expected {expected}")]
    UnsupportedScheme {
        found: String,
        expected: &'static str,
    },

    #[error("URL must have a host")]
    MissingHost,

    #[error("URL must not embed credentials")]
    EmbeddedCredentials,
}

fn check_host_and_userinfo(parsed: &Url) -> Result<(), UrlValidationError> {
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }
    // Credentials travel in the Authorization header, never in the URL.
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(UrlValidationError::EmbeddedCredentials);
    }
    Ok(())
}

/// Validate the upstream realtime endpoint.
pub fn validate_upstream_url(url: &str) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;
    match parsed.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(UrlValidationError::UnsupportedScheme {
                found: other.to_string(),
                expected: "ws or wss",
            });
        }
    }
    check_host_and_userinfo(&parsed)?;
    Ok(parsed)
}

/// Validate the HTTP session resolver base URL.
pub fn validate_resolver_url(url: &str) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(UrlValidationError::UnsupportedScheme {
                found: other.to_string(),
                expected: "http or https",
            });
        }
    }
    check_host_and_userinfo(&parsed)?;
    Ok(parsed)
}
