// Error types for restgate
// Author: kelexine (https://github.com/kelexine)

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown service alias '{0}'. Check services.routes configuration")]
    UnknownAlias(String),

    #[error("No metadata for operation '{operation}' on service '{alias}'. Check your mapping configuration")]
    UnknownOperation { alias: String, operation: String },

    #[error("Operation '{operation}' is declared twice on service '{alias}'")]
    DuplicateOperation { alias: String, operation: String },

    #[error("Invalid binding on operation '{operation}', parameter #{index}: {reason}")]
    InvalidBinding {
        operation: String,
        index: usize,
        reason: String,
    },

    #[error("Parameter #{index} of operation '{operation}' declares conflicting bindings: {kinds}")]
    ConflictingBinding {
        operation: String,
        index: usize,
        kinds: String,
    },

    #[error("Operation '{operation}' declares more than one body parameter")]
    DuplicateBody { operation: String },

    #[error("Path placeholder '${{{placeholder}}}' of operation '{operation}' is not bound by any parameter")]
    UnboundPlaceholder {
        operation: String,
        placeholder: String,
    },

    #[error("Fallback '{fallback}' of operation '{operation}' is not registered")]
    UnknownFallback { operation: String, fallback: String },

    #[error("Operation '{operation}' expects {expected} arguments, got {actual}")]
    ArgumentCount {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("Operation '{operation}' returns {declared}, but was called as {requested}")]
    ShapeMismatch {
        operation: String,
        declared: &'static str,
        requested: &'static str,
    },

    #[error("Invalid value for header '{name}': {reason}")]
    InvalidHeaderValue { name: String, reason: String },

    #[error("Fallback '{fallback}' of operation '{operation}' failed: {source}")]
    Fallback {
        operation: String,
        fallback: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Response decoding error on operation '{operation}': {reason}")]
    Decode { operation: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("Descriptor parsing error: {0}")]
    DescriptorParsing(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Whether this error was raised while building the gateway, before any call
    /// could be made.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GatewayError::Config(_)
                | GatewayError::UnknownAlias(_)
                | GatewayError::DuplicateOperation { .. }
                | GatewayError::InvalidBinding { .. }
                | GatewayError::ConflictingBinding { .. }
                | GatewayError::DuplicateBody { .. }
                | GatewayError::UnboundPlaceholder { .. }
                | GatewayError::UnknownFallback { .. }
                | GatewayError::ConfigParsing(_)
                | GatewayError::DescriptorParsing(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
