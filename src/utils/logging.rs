//! Structured logging and credential-safe trace utilities.
//!
//! This module configures the `tracing` ecosystem for the gateway and
//! provides helpers that keep credentials carried in request headers out of
//! the logs.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::LoggingConfig;
use crate::error::{GatewayError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const REDACTED: &str = "[REDACTED]";

static BEARER_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(bearer|basic|token)\s+[A-Za-z0-9\-._~+/]+=*")
        .expect("credential pattern is valid")
});

/// Header names whose values never reach a log sink.
const SENSITIVE_NAMES: &[&str] = &["authorization", "proxy-authorization", "cookie", "set-cookie"];

/// Name fragments that mark a header as a credential.
const SENSITIVE_FRAGMENTS: &[&str] = &["token", "api-key", "apikey", "secret", "password"];

/// Initializes the global tracing subscriber.
///
/// Supports three output formats:
/// - `json`: Structured JSON logs for production ingestion.
/// - `compact`: Single-line human-readable output.
/// - `pretty` (default): Multi-line colorized output for development.
///
/// Log levels are controlled via the `RUST_LOG` environment variable or
/// the provided `LoggingConfig`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    // Configure filter from environment or config file
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format.as_str() {
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        "compact" => registry.with(tracing_subscriber::fmt::layer().compact()).try_init(),
        _ => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
    };

    result.map_err(|e| GatewayError::Internal(format!("Failed to initialize logging: {}", e)))
}

/// Replaces `Bearer`/`Basic`/`Token` credentials embedded in free text.
pub fn sanitize(input: &str) -> String {
    BEARER_TOKEN
        .replace_all(input, |caps: &regex::Captures| format!("{} {}", &caps[1], REDACTED))
        .into_owned()
}

/// Whether a header's value should be hidden from logs.
pub fn is_sensitive_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SENSITIVE_NAMES.contains(&name.as_str())
        || SENSITIVE_FRAGMENTS.iter().any(|fragment| name.contains(fragment))
}

/// Renders a header map for debug logs with credentials masked.
pub fn sanitize_headers(headers: &HeaderMap) -> String {
    let rendered: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive_header(name.as_str()) {
                REDACTED.to_string()
            } else {
                sanitize(&String::from_utf8_lossy(value.as_bytes()))
            };
            format!("{}: {}", name, value)
        })
        .collect();
    format!("{{{}}}", rendered.join(", "))
}
