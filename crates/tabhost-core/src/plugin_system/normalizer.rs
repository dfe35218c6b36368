//! Converts raw configuration records into [`PluginDescriptor`]s.
//!
//! Both formats share one defaulting table and one validation pass. The only
//! format-specific rule is the navigation root prefix applied to key/value
//! configs, which lives in [`apply_sections_root`] as an explicit
//! post-processing step.
use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::kernel::constants::NAVIGATION_ROOT;
use crate::plugin_system::config_parser::{RawConfig, SectionsConfig, StructuredConfig};
use crate::plugin_system::descriptor::{
    normalize_path, EntryPoint, Placement, PluginDescriptor, PluginGroup, PluginKind, PluginMeta,
    RuntimeSpec, SourceFormat, DEFAULT_AUTHOR, DEFAULT_CATEGORY, DEFAULT_VERSION,
};
use crate::plugin_system::error::PluginSystemError;

// --- Intermediate structs for deserialization ---
//
// Every field is read leniently: a value of the wrong shape falls back to the
// default instead of rejecting the whole entry. Only a missing `name` or
// `entry_point` drops a plugin.

#[derive(Deserialize, Debug, Default)]
struct RawPluginEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    entry_point: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    author: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    icon: Option<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    placement: RawPlacement,
    #[serde(default, deserialize_with = "lenient_object")]
    runtime: RawRuntime,
}

#[derive(Deserialize, Debug, Default)]
struct RawPlacement {
    #[serde(default, deserialize_with = "lenient_string")]
    path: Option<String>,
    #[serde(default)]
    priority: Option<Value>,
}

#[derive(Deserialize, Debug, Default)]
struct RawRuntime {
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    dependencies: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    config: Option<String>,
}

/// Strings are kept, numbers and booleans are stringified, anything else is absent.
fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_to_string(Value::deserialize(deserializer)?))
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
        _ => T::default(),
    })
}

// --- End Intermediate structs ---

/// Descriptors produced from one raw record, plus the entries that were dropped.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub descriptors: Vec<PluginDescriptor>,
    pub rejected: Vec<PluginSystemError>,
}

/// Normalize a raw record found in `dir`.
///
/// Yields zero descriptors when required fields are missing, one for
/// single-plugin records and one per valid entry for multi-plugin records.
pub fn normalize(raw: RawConfig, dir: &Path) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    let results: Vec<Result<PluginDescriptor, PluginSystemError>> = match raw {
        RawConfig::Structured(StructuredConfig::Single(value)) => {
            vec![normalize_structured_entry(value, dir, None)]
        }
        RawConfig::Structured(StructuredConfig::Multi { group, entries }) => entries
            .into_iter()
            .map(|entry| normalize_structured_entry(entry, dir, Some(&group)))
            .collect(),
        RawConfig::Sections(sections) => vec![normalize_sections(&sections, dir)],
    };

    for result in results {
        match result {
            Ok(descriptor) => {
                debug!("Normalized plugin '{}' from {}", descriptor.name(), descriptor.source_format);
                batch.descriptors.push(descriptor);
            }
            Err(e) => {
                error!("{}", e);
                batch.rejected.push(e);
            }
        }
    }

    batch
}

fn invalid(dir: &Path, plugin: Option<&str>, message: impl Into<String>) -> PluginSystemError {
    PluginSystemError::DescriptorInvalid {
        dir: dir.to_path_buf(),
        plugin: plugin.map(str::to_string),
        message: message.into(),
    }
}

fn normalize_structured_entry(
    value: Value,
    dir: &Path,
    group: Option<&PluginGroup>,
) -> Result<PluginDescriptor, PluginSystemError> {
    if !value.is_object() {
        return Err(invalid(dir, None, "plugin entry must be an object"));
    }
    let raw: RawPluginEntry = serde_json::from_value(value)
        .map_err(|e| invalid(dir, None, format!("Failed to parse plugin entry: {}", e)))?;

    let name = require(raw.name, dir, None, "name")?;
    let entry_point = require(raw.entry_point, dir, Some(&name), "entry_point")?;
    let kind = parse_kind(raw.runtime.kind.as_deref(), dir, &name)?;
    let entry_point = parse_entry_point(&entry_point, dir, &name)?;

    Ok(PluginDescriptor {
        meta: build_meta(name, raw.version, raw.author, raw.description, raw.category),
        placement: Placement {
            path: normalize_path(raw.placement.path.as_deref().unwrap_or("")),
            priority: coerce_priority(raw.placement.priority.as_ref()),
            icon_ref: raw.icon.unwrap_or_default(),
        },
        runtime: RuntimeSpec {
            kind,
            entry_point,
            dependencies: raw.runtime.dependencies,
            config: raw.runtime.config.unwrap_or_default(),
        },
        directory: dir.to_path_buf(),
        source_format: SourceFormat::Structured,
        group: group.cloned(),
    })
}

fn normalize_sections(sections: &SectionsConfig, dir: &Path) -> Result<PluginDescriptor, PluginSystemError> {
    let meta = &sections.metadata;
    let placement = &sections.placement;
    let runtime = &sections.runtime;

    let name = require(non_empty(meta, "name"), dir, None, "metadata.name")?;
    let entry_point = require(non_empty(runtime, "entry_point"), dir, Some(&name), "runtime.entry_point")?;
    let kind = parse_kind(runtime.get("type").map(String::as_str), dir, &name)?;
    let entry_point = parse_entry_point(&entry_point, dir, &name)?;

    let declared_path = normalize_path(placement.get("path").map(String::as_str).unwrap_or(""));
    let priority = placement
        .get("priority")
        .map(|p| Value::String(p.clone()));
    let icon_ref = non_empty(placement, "favicon")
        .or_else(|| non_empty(meta, "favicon"))
        .unwrap_or_default();

    Ok(PluginDescriptor {
        meta: build_meta(
            name,
            non_empty(meta, "version"),
            non_empty(meta, "author"),
            meta.get("description").cloned(),
            non_empty(meta, "category"),
        ),
        placement: Placement {
            path: apply_sections_root(&declared_path),
            priority: coerce_priority(priority.as_ref()),
            icon_ref,
        },
        runtime: RuntimeSpec {
            kind,
            entry_point,
            dependencies: runtime
                .get("dependencies")
                .map(|deps| split_list(deps))
                .unwrap_or_default(),
            config: runtime.get("config").cloned().unwrap_or_default(),
        },
        directory: dir.to_path_buf(),
        source_format: SourceFormat::Sections,
        group: None,
    })
}

/// Key/value configs always live under the navigation root segment: an empty
/// path becomes the root itself, anything else is nested beneath it.
pub fn apply_sections_root(path: &str) -> String {
    if path.is_empty() {
        NAVIGATION_ROOT.to_string()
    } else {
        format!("{}/{}", NAVIGATION_ROOT, path)
    }
}

/// Coerce a declared priority into an integer; anything non-numeric is 0.
pub fn coerce_priority(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .unwrap_or(0)
        }
        Some(Value::Bool(b)) => i64::from(*b),
        _ => 0,
    }
}

fn build_meta(
    name: String,
    version: Option<String>,
    author: Option<String>,
    description: Option<String>,
    category: Option<String>,
) -> PluginMeta {
    PluginMeta {
        name,
        version: version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        author: author.unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        description: description.unwrap_or_default(),
        category: category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
    }
}

fn require(
    value: Option<String>,
    dir: &Path,
    plugin: Option<&str>,
    field: &str,
) -> Result<String, PluginSystemError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(invalid(dir, plugin, format!("Missing required field '{}'", field))),
    }
}

fn parse_kind(label: Option<&str>, dir: &Path, name: &str) -> Result<PluginKind, PluginSystemError> {
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        None => Ok(PluginKind::default()),
        Some(label) => PluginKind::from_label(label)
            .ok_or_else(|| invalid(dir, Some(name), format!("Unknown plugin type '{}'", label))),
    }
}

fn parse_entry_point(raw: &str, dir: &Path, name: &str) -> Result<EntryPoint, PluginSystemError> {
    raw.parse::<EntryPoint>()
        .map_err(|e| invalid(dir, Some(name), e.to_string()))
}

fn non_empty(map: &BTreeMap<String, String>, key: &str) -> Option<String> {
    map.get(key).filter(|v| !v.is_empty()).cloned()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
