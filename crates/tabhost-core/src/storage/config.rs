use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::kernel::constants::{DEFAULT_PLUGINS_DIR, DEFAULT_RUNTIME_DIR, ENVIRONMENTS_FILE};
use crate::storage::error::StorageSystemError;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// In-memory representation of configuration data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigData {
    /// Raw configuration values
    #[serde(flatten)]
    values: HashMap<String, serde_json::Value>,
}

impl ConfigData {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a configuration value; `None` when absent or of the wrong type
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Like [`ConfigData::get`], but a present value of the wrong type is an error.
    pub fn get_checked<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageSystemError> {
        match self.values.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| StorageSystemError::InvalidValue {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Set a configuration value
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), StorageSystemError> {
        let json_value = serde_json::to_value(value).map_err(|e| StorageSystemError::SerializationError {
            format: "json".to_string(),
            source: Box::new(e),
        })?;
        self.values.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String, StorageSystemError> {
        fn failed(format: ConfigFormat, e: impl std::error::Error + Send + Sync + 'static) -> StorageSystemError {
            StorageSystemError::SerializationError {
                format: format.extension().to_string(),
                source: Box::new(e),
            }
        }
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(&self).map_err(|e| failed(format, e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(&self).map_err(|e| failed(format, e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(&self).map_err(|e| failed(format, e)),
        }
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self, StorageSystemError> {
        fn failed(format: ConfigFormat, e: impl std::error::Error + Send + Sync + 'static) -> StorageSystemError {
            StorageSystemError::DeserializationError {
                format: format.extension().to_string(),
                source: Box::new(e),
            }
        }
        match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| failed(format, e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| failed(format, e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| failed(format, e)),
        }
    }
}

/// Typed view of the host configuration file.
///
/// Recognised keys: `plugins_dir`, `runtime_dir`, `environments_file` and
/// `log_level`. Unknown keys are ignored.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub plugins_dir: PathBuf,
    pub runtime_dir: PathBuf,
    pub environments_file: PathBuf,
    pub log_level: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        let runtime_dir = PathBuf::from(DEFAULT_RUNTIME_DIR);
        Self {
            plugins_dir: PathBuf::from(DEFAULT_PLUGINS_DIR),
            environments_file: runtime_dir.join(ENVIRONMENTS_FILE),
            runtime_dir,
            log_level: None,
        }
    }
}

impl HostConfig {
    /// Load from `path`. A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, StorageSystemError> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| StorageSystemError::io(e, "read config", path.to_path_buf()))?;
        let data = ConfigData::deserialize(&content, format)?;
        info!("Loaded host configuration from {}", path.display());
        Self::from_data(data)
    }

    pub fn from_data(data: ConfigData) -> Result<Self, StorageSystemError> {
        let plugins_dir = data
            .get_checked::<PathBuf>("plugins_dir")?
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PLUGINS_DIR));
        let runtime_dir = data
            .get_checked::<PathBuf>("runtime_dir")?
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNTIME_DIR));
        let environments_file = data
            .get_checked::<PathBuf>("environments_file")?
            .unwrap_or_else(|| runtime_dir.join(ENVIRONMENTS_FILE));
        let log_level = data.get_checked::<String>("log_level")?;

        Ok(Self {
            plugins_dir,
            runtime_dir,
            environments_file,
            log_level,
        })
    }
}
