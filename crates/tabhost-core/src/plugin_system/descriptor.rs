use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::plugin_system::strategy::{LoadStrategy, PolyStrategy, SimpleStrategy};

/// Default plugin version
pub const DEFAULT_VERSION: &str = "1.0";
/// Default plugin author
pub const DEFAULT_AUTHOR: &str = "Unknown";
/// Default plugin category
pub const DEFAULT_CATEGORY: &str = "General";
/// Separator between navigation path segments
pub const PATH_SEPARATOR: char = '/';
/// Separator between module locator and class name in an entry point
pub const ENTRY_POINT_SEPARATOR: char = ':';

/// Canonical, format-independent description of one loadable plugin.
///
/// Created fresh on every discovery pass; never cached across scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub meta: PluginMeta,
    pub placement: Placement,
    pub runtime: RuntimeSpec,
    /// The plugin's own directory; every relative reference resolves against it.
    pub directory: PathBuf,
    /// Which configuration file produced this descriptor (diagnostics only).
    pub source_format: SourceFormat,
    /// Group information when the descriptor came from a multi-plugin record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<PluginGroup>,
}

/// Human-facing metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMeta {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub category: String,
}

/// Where the plugin appears in the host's navigation tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Navigation path, segments joined by `/`; empty means the navigation root.
    pub path: String,
    /// Lower sorts first.
    pub priority: i64,
    /// Declared icon reference; may be empty, a resource reference or a relative file path.
    pub icon_ref: String,
}

/// How to load and start the plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSpec {
    pub kind: PluginKind,
    pub entry_point: EntryPoint,
    /// Informational only.
    pub dependencies: Vec<String>,
    /// Optional path to a plugin-owned config file, opaque to the core.
    pub config: String,
}

/// Retained group-level information of a multi-plugin structured record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginGroup {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub shared_resources: serde_json::Value,
}

/// Load strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// Module loaded from an explicit file path inside the plugin directory.
    #[default]
    Simple,
    /// Plugin directory treated as a package root on the module search path.
    Poly,
}

impl PluginKind {
    /// Parse a kind label as written in a configuration file.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "pyplug" | "simple" => Some(PluginKind::Simple),
            "polypyplug" | "poly" => Some(PluginKind::Poly),
            _ => None,
        }
    }

    /// The load strategy implementing this kind.
    pub fn strategy(&self) -> Box<dyn LoadStrategy> {
        match self {
            PluginKind::Simple => Box::new(SimpleStrategy),
            PluginKind::Poly => Box::new(PolyStrategy),
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::Simple => f.write_str("simple"),
            PluginKind::Poly => f.write_str("poly"),
        }
    }
}

/// Configuration file format a descriptor was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// `settings.json`
    Structured,
    /// `settings.ini`
    Sections,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Structured => f.write_str("settings.json"),
            SourceFormat::Sections => f.write_str("settings.ini"),
        }
    }
}

/// A `<module-locator>:<ClassName>` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryPoint {
    module: String,
    class: String,
}

/// Why an entry point string was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryPointError {
    #[error("entry point '{0}' has no ':' separating module and class")]
    MissingSeparator(String),
    #[error("entry point '{0}' contains more than one ':'")]
    ExtraSeparator(String),
    #[error("entry point '{0}' has an empty module locator")]
    EmptyModule(String),
    #[error("entry point '{0}' has an empty class name")]
    EmptyClass(String),
}

impl EntryPoint {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn class(&self) -> &str {
        &self.class
    }
}

impl FromStr for EntryPoint {
    type Err = EntryPointError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (module, class) = raw
            .split_once(ENTRY_POINT_SEPARATOR)
            .ok_or_else(|| EntryPointError::MissingSeparator(raw.to_string()))?;
        if class.contains(ENTRY_POINT_SEPARATOR) {
            return Err(EntryPointError::ExtraSeparator(raw.to_string()));
        }
        let (module, class) = (module.trim(), class.trim());
        if module.is_empty() {
            return Err(EntryPointError::EmptyModule(raw.to_string()));
        }
        if class.is_empty() {
            return Err(EntryPointError::EmptyClass(raw.to_string()));
        }
        Ok(Self {
            module: module.to_string(),
            class: class.to_string(),
        })
    }
}

impl TryFrom<String> for EntryPoint {
    type Error = EntryPointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntryPoint> for String {
    fn from(value: EntryPoint) -> Self {
        value.to_string()
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.module, ENTRY_POINT_SEPARATOR, self.class)
    }
}

impl PluginDescriptor {
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn priority(&self) -> i64 {
        self.placement.priority
    }

    /// Navigation path split into its segments; empty for the root.
    pub fn path_segments(&self) -> Vec<&str> {
        self.placement
            .path
            .split(PATH_SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .collect()
    }
}

/// Normalize a navigation path: drop empty segments so the result never
/// starts or ends with a separator.
pub fn normalize_path(raw: &str) -> String {
    raw.split(PATH_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
