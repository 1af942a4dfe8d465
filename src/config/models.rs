//! Configuration data structures for the restgate gateway.
//!
//! This module defines the schema for the application settings: the service
//! routing table, the shared HTTP client, and logging.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::models::ServiceRoute;
use serde::{Deserialize, Serialize};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Service alias to host routing.
    #[serde(default)]
    pub services: ServicesConfig,

    /// Shared HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Routing table entries, one per service alias.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServicesConfig {
    /// `[[services.routes]]` entries with `alias` and `host`.
    #[serde(default)]
    pub routes: Vec<ServiceRoute>,
}

/// Settings for the shared upstream HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// TCP connect timeout in seconds. There is no overall request timeout;
    /// callers bound a call by dropping it.
    /// Default: `10`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Maximum number of idle connections kept per upstream host.
    /// Default: `32`
    #[serde(default = "default_pool_size")]
    pub pool_max_idle_per_host: usize,

    /// How long an idle pooled connection is kept, in seconds.
    /// Default: `90`
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_seconds: u64,

    /// `User-Agent` sent with every request.
    /// Default: `restgate/<version>`
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`, `compact`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Whether to mask credentials in logged request headers.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub sanitize_headers: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: default_connect_timeout(),
            pool_max_idle_per_host: default_pool_size(),
            pool_idle_timeout_seconds: default_pool_idle_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            sanitize_headers: true,
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_pool_size() -> usize {
    32
}

fn default_pool_idle_timeout() -> u64 {
    90
}

fn default_user_agent() -> String {
    format!("restgate/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
