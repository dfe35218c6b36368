//! Locates and parses a plugin directory's configuration file.
//!
//! Two formats are recognised. The structured-data file (`settings.json`) is
//! tried first; the key/value-sections file (`settings.ini`) is the fallback.
//! Parsing produces a format-specific [`RawConfig`]; turning it into
//! descriptors is the normalizer's job.
use std::collections::BTreeMap;
use std::path::Path;

use ini::{Ini, ParseOption};
use log::{debug, error, info, warn};
use serde_json::Value;

use crate::kernel::constants::{SECTIONS_CONFIG_FILE, STRUCTURED_CONFIG_FILE};
use crate::plugin_system::descriptor::PluginGroup;
use crate::plugin_system::error::PluginSystemError;

/// Sections every key/value config must carry.
pub const REQUIRED_SECTIONS: [&str; 3] = ["metadata", "placement", "runtime"];

/// Default group name for multi-plugin records that do not declare one
const DEFAULT_GROUP_NAME: &str = "Unknown";

/// A parsed but not yet normalized configuration file.
#[derive(Debug, Clone, PartialEq)]
pub enum RawConfig {
    Structured(StructuredConfig),
    Sections(SectionsConfig),
}

/// Structured-data record: one plugin, or a group of plugins.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredConfig {
    Single(Value),
    Multi {
        group: PluginGroup,
        entries: Vec<Value>,
    },
}

impl StructuredConfig {
    /// A `{}` record, which counts as no structured config at all.
    pub fn is_empty(&self) -> bool {
        matches!(self, StructuredConfig::Single(Value::Object(object)) if object.is_empty())
    }
}

/// Flat string mappings of the three required sections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SectionsConfig {
    pub metadata: BTreeMap<String, String>,
    pub placement: BTreeMap<String, String>,
    pub runtime: BTreeMap<String, String>,
}

/// Parse the configuration of a single plugin directory.
///
/// Returns `ConfigMissing` when neither file exists, `ConfigMalformed` when a
/// file exists but neither yields a usable record. A malformed or empty
/// structured file still falls back to the key/value file.
pub async fn parse_plugin_dir(dir: &Path) -> Result<RawConfig, PluginSystemError> {
    let json_path = dir.join(STRUCTURED_CONFIG_FILE);
    let ini_path = dir.join(SECTIONS_CONFIG_FILE);

    let mut last_error = None;

    if file_exists(&json_path).await {
        match read_structured(&json_path).await {
            Ok(config) if config.is_empty() => {
                warn!("Structured config {} is empty, trying key/value config", json_path.display());
            }
            Ok(config) => {
                info!("Loaded structured config from {}", json_path.display());
                return Ok(RawConfig::Structured(config));
            }
            Err(e) => {
                error!("Failed to load structured config from {}: {}", json_path.display(), e);
                last_error = Some(e);
            }
        }
    }

    if file_exists(&ini_path).await {
        match read_sections(&ini_path).await {
            Ok(config) => {
                info!("Loaded key/value config from {}", ini_path.display());
                return Ok(RawConfig::Sections(config));
            }
            Err(e) => {
                error!("Failed to load key/value config from {}: {}", ini_path.display(), e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e),
        None => {
            warn!("No valid configuration found in {}", dir.display());
            Err(PluginSystemError::ConfigMissing { dir: dir.to_path_buf() })
        }
    }
}

async fn file_exists(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file(),
        Err(_) => false,
    }
}

async fn read_structured(path: &Path) -> Result<StructuredConfig, PluginSystemError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PluginSystemError::malformed(path, "Failed to read structured config", e))?;
    parse_structured(&content, path)
}

async fn read_sections(path: &Path) -> Result<SectionsConfig, PluginSystemError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PluginSystemError::malformed(path, "Failed to read key/value config", e))?;
    parse_sections(&content, path)
}

/// Parse structured-data config text. `path` is only used for error reporting.
pub fn parse_structured(content: &str, path: &Path) -> Result<StructuredConfig, PluginSystemError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| PluginSystemError::malformed(path, "Failed to parse JSON", e))?;

    let Value::Object(mut object) = value else {
        return Err(PluginSystemError::ConfigMalformed {
            path: path.to_path_buf(),
            message: "top-level value must be an object".to_string(),
            source: None,
        });
    };

    // Only a `plugins` list makes a multi-plugin record; anything else is
    // treated as a single plugin and validated by the normalizer.
    if matches!(object.get("plugins"), Some(Value::Array(_))) {
        let entries = match object.remove("plugins") {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        };
        let group = PluginGroup {
            name: string_field(&object, "plugin_group").unwrap_or_else(|| DEFAULT_GROUP_NAME.to_string()),
            description: string_field(&object, "description").unwrap_or_default(),
            shared_resources: object
                .remove("shared_resources")
                .unwrap_or_else(|| Value::Object(Default::default())),
        };
        debug!("Multi-plugin record '{}' with {} entries in {}", group.name, entries.len(), path.display());
        return Ok(StructuredConfig::Multi { group, entries });
    }

    Ok(StructuredConfig::Single(Value::Object(object)))
}

fn string_field(object: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

/// Parse key/value-sections config text. Fails closed: a missing required
/// section rejects the whole file.
pub fn parse_sections(content: &str, path: &Path) -> Result<SectionsConfig, PluginSystemError> {
    let opt = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_str_opt(content, opt)
        .map_err(|e| PluginSystemError::malformed(path, "Failed to parse key/value config", e))?;

    let section = |name: &str| -> Result<BTreeMap<String, String>, PluginSystemError> {
        let props = ini.section(Some(name)).ok_or_else(|| PluginSystemError::ConfigMalformed {
            path: path.to_path_buf(),
            message: format!("Missing required section [{}]", name),
            source: None,
        })?;
        // Keys are case-insensitive; the first occurrence of a key wins.
        let mut map = BTreeMap::new();
        for (key, value) in props.iter() {
            map.entry(key.trim().to_lowercase())
                .or_insert_with(|| value.trim().to_string());
        }
        Ok(map)
    };

    Ok(SectionsConfig {
        metadata: section(REQUIRED_SECTIONS[0])?,
        placement: section(REQUIRED_SECTIONS[1])?,
        runtime: section(REQUIRED_SECTIONS[2])?,
    })
}
