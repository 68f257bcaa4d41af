//! Application configuration loading.

use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use super::THREADKEEPER_CONFIG_PATH;
use super::types::ManagerConfig;

/// The complete configuration file structure.
#[derive(Default, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Conversation manager selection and limits
    pub manager: ManagerConfig,
}

impl AppConfig {
    /// Load configuration from `custom_config_path`, or from the default
    /// location under the home directory. A missing file yields defaults.
    pub fn load<P: AsRef<Path>>(custom_config_path: Option<P>) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(custom_config_path);
        Self::load_config_file(&config_path)
    }

    pub(crate) fn get_config_path<P: AsRef<Path>>(path: Option<P>) -> PathBuf {
        match path {
            Some(p) => p.as_ref().to_path_buf(),
            None => dirs::home_dir()
                .unwrap_or_default()
                .join(THREADKEEPER_CONFIG_PATH),
        }
    }

    pub(crate) fn load_config_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(config_path.as_ref()) {
            Ok(content) => toml::from_str::<AppConfig>(&content).map_err(|e| {
                ConfigError::Message(format!(
                    "Failed to parse config file {}: {}",
                    config_path.as_ref().display(),
                    e
                ))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(
                    path = %config_path.as_ref().display(),
                    "config file not found, using defaults"
                );
                Ok(AppConfig::default())
            }
            Err(e) => Err(ConfigError::Message(format!(
                "Failed to read config file: {}",
                e
            ))),
        }
    }

    /// Render this configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Message(format!("Failed to render config: {}", e)))
    }
}
