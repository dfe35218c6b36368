use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::kernel::constants::BASE_ENVIRONMENT;
use crate::runtime_env::error::RuntimeEnvError;

/// How a module directory is exposed once its environment is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    /// Importable package: module search path only
    #[default]
    Package,
    /// Directory of programs: module search path and executable path
    Common,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    #[serde(rename = "type", default)]
    pub kind: ModuleType,
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub type ModuleMap = BTreeMap<String, ModuleEntry>;

/// The persisted list of environments and the modules each one exposes.
///
/// On disk this is a JSON document with a `base` module map and a `custom`
/// map of environment name to module map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentCatalog {
    #[serde(default)]
    pub base: ModuleMap,
    #[serde(default)]
    pub custom: BTreeMap<String, ModuleMap>,
}

impl EnvironmentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file is an empty catalog.
    pub fn load(path: &Path) -> Result<Self, RuntimeEnvError> {
        if !path.exists() {
            warn!("Environment catalog {} not found, starting empty", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| RuntimeEnvError::io(e, "read catalog", path.to_path_buf()))?;
        let catalog: Self = serde_json::from_str(&content).map_err(|source| RuntimeEnvError::CatalogMalformed {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            "Loaded environment catalog from {} ({} custom environments)",
            path.display(),
            catalog.custom.len()
        );
        Ok(catalog)
    }

    /// Write the catalog as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), RuntimeEnvError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| RuntimeEnvError::io(e, "create catalog dir", parent.to_path_buf()))?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| RuntimeEnvError::CatalogMalformed {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(|e| RuntimeEnvError::io(e, "write catalog", path.to_path_buf()))?;
        debug!("Saved environment catalog to {}", path.display());
        Ok(())
    }

    /// Modules of `env`; `base` names the base map.
    pub fn modules(&self, env: &str) -> Option<&ModuleMap> {
        if env == BASE_ENVIRONMENT {
            Some(&self.base)
        } else {
            self.custom.get(env)
        }
    }

    /// Custom environment names, sorted.
    pub fn environment_names(&self) -> impl Iterator<Item = &str> {
        self.custom.keys().map(String::as_str)
    }

    /// Add an empty custom environment. Returns `false` if it already exists.
    pub fn add_environment(&mut self, env: &str) -> bool {
        if env == BASE_ENVIRONMENT || self.custom.contains_key(env) {
            return false;
        }
        self.custom.insert(env.to_string(), ModuleMap::new());
        true
    }

    pub fn remove_environment(&mut self, env: &str) -> Option<ModuleMap> {
        self.custom.remove(env)
    }

    /// Add or replace `module` in `env`. Returns `false` if `env` is unknown.
    pub fn add_module(&mut self, env: &str, module: &str, entry: ModuleEntry) -> bool {
        let map = if env == BASE_ENVIRONMENT {
            &mut self.base
        } else {
            match self.custom.get_mut(env) {
                Some(map) => map,
                None => return false,
            }
        };
        map.insert(module.to_string(), entry);
        true
    }

    pub fn remove_module(&mut self, env: &str, module: &str) -> Option<ModuleEntry> {
        if env == BASE_ENVIRONMENT {
            self.base.remove(module)
        } else {
            self.custom.get_mut(env)?.remove(module)
        }
    }
}
