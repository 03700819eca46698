//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub polling: PollingConfig,
    pub generation: GenerationDefaults,
    pub logging: LoggingConfig,
}

/// Generation server connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,
    /// Request timeout; 0 leaves the transport default in place
    #[serde(default)]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_static_prefix() -> String {
    "/static/generated".to_string()
}

/// Local store location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
}

fn default_state_dir() -> String {
    "./.batch-studio".to_string()
}

fn default_file_name() -> String {
    "local_storage.json".to_string()
}

/// Job status polling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

/// Form defaults applied to a fresh session
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationDefaults {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
}

fn default_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_mode() -> String {
    "sequential".to_string()
}

fn default_aspect_ratio() -> String {
    "1:1".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load settings from the default configuration file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/studio.yaml")
    }

    /// Load settings from a specific configuration file (YAML or TOML)
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let format = if path.extension().map_or(false, |ext| ext == "yaml" || ext == "yml") {
            FileFormat::Yaml
        } else {
            FileFormat::Toml
        };

        let mut builder = Config::builder()
            .set_default("server.base_url", default_base_url())?
            .set_default("server.api_prefix", default_api_prefix())?
            .set_default("server.static_prefix", default_static_prefix())?
            .set_default("server.timeout_ms", 0)?
            .set_default("storage.state_dir", default_state_dir())?
            .set_default("storage.file_name", default_file_name())?
            .set_default("polling.interval_ms", default_interval_ms())?
            .set_default("generation.model", default_model())?
            .set_default("generation.mode", default_mode())?
            .set_default("generation.aspect_ratio", default_aspect_ratio())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?;

        if path.exists() {
            builder = builder.add_source(File::from(path).format(format));
        }

        builder = builder.add_source(
            Environment::with_prefix("BATCH_STUDIO")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let base = self.server.base_url.trim();
        if base.is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server base_url cannot be empty".to_string(),
            )));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(AppError::Config(config::ConfigError::Message(format!(
                "Server base_url '{}' must start with http:// or https://",
                base
            ))));
        }

        if self.polling.interval_ms == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Polling interval cannot be 0".to_string(),
            )));
        }

        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            other => {
                return Err(AppError::Config(config::ConfigError::Message(format!(
                    "Unknown logging format '{}'",
                    other
                ))))
            }
        }

        Ok(())
    }

    /// Root URL of the JSON API, without a trailing slash
    pub fn api_base(&self) -> String {
        join_url(&self.server.base_url, &self.server.api_prefix)
    }

    /// Root URL of generated image assets, without a trailing slash
    pub fn static_base(&self) -> String {
        join_url(&self.server.base_url, &self.server.static_prefix)
    }

    /// Request timeout, if one is configured
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.server.timeout_ms > 0).then(|| Duration::from_millis(self.server.timeout_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }

    /// Path of the local store file
    pub fn store_path(&self) -> PathBuf {
        Path::new(&self.storage.state_dir).join(&self.storage.file_name)
    }

    /// Effective settings rendered as YAML, loadable by [`Settings::load_from_path`]
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| AppError::Internal(format!("Failed to render settings: {}", e)))
    }
}

fn join_url(base: &str, prefix: &str) -> String {
    let base = base.trim_end_matches('/');
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, prefix)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                base_url: default_base_url(),
                api_prefix: default_api_prefix(),
                static_prefix: default_static_prefix(),
                timeout_ms: 0,
            },
            storage: StorageConfig {
                state_dir: default_state_dir(),
                file_name: default_file_name(),
            },
            polling: PollingConfig {
                interval_ms: default_interval_ms(),
            },
            generation: GenerationDefaults {
                model: default_model(),
                mode: default_mode(),
                aspect_ratio: default_aspect_ratio(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }
}
