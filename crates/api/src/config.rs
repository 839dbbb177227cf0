//! Server configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then `FLOWER_*`
//! environment variables (`__` separates nested keys, e.g.
//! `FLOWER_ENGINE__BACKEND=ort`).

use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File, Map};
use inference_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitConfig;

/// Config file read when `FLOWER_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "flower-classifier.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "FLOWER_CONFIG";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Class mapping document (flat or nested under `class_to_idx`)
    pub class_index_path: PathBuf,
    /// Multipart field carrying the image
    pub upload_field: String,
    /// Request body limit in bytes
    pub max_upload_bytes: usize,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Inference engine settings
    pub engine: EngineConfig,
    /// Per-IP rate limiting
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            class_index_path: PathBuf::from("class_to_idx.json"),
            upload_field: "flower_image".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            log_level: "info".to_string(),
            engine: EngineConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `FLOWER_CONFIG` (or the default file, if present) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(path.as_deref())
    }

    /// Load from an explicit file, which must then exist
    pub fn load_from(path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// As [`ServerConfig::load_from`], reading `FLOWER_*` variables from `env`
    /// instead of the process environment when given
    pub fn load_with_env(
        path: Option<&str>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("FLOWER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }

    /// `host:port` listen address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
