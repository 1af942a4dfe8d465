// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::error::{GatewayError, Result};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file (`path`, or `~/.restgate/config.toml`)
    /// 3. Defaults (lowest)
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(&Self::default_config_path()).required(false),
        };

        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            .add_source(file)
            // Override with environment variables (prefix: RESTGATE_)
            .add_source(
                Environment::with_prefix("RESTGATE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        debug!("Loaded configuration with {} service routes", config.services.routes.len());
        Ok(config)
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".restgate")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}
