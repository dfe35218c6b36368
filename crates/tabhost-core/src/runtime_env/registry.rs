use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::kernel::constants::{ACTIVE_ENVIRONMENTS_FILE, BASE_ENVIRONMENT};
use crate::plugin_system::search_path::{ExecutablePath, SearchPath};
use crate::runtime_env::catalog::{EnvironmentCatalog, ModuleType};
use crate::runtime_env::error::RuntimeEnvError;
use crate::utils::fs::{contains_native_library, list_subdirectories};

/// Paths an environment added while active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contribution {
    pub module_paths: Vec<PathBuf>,
    pub executable_paths: Vec<PathBuf>,
}

impl Contribution {
    pub fn is_empty(&self) -> bool {
        self.module_paths.is_empty() && self.executable_paths.is_empty()
    }

    fn absorb(&mut self, other: Contribution) {
        for path in other.module_paths {
            if !self.module_paths.contains(&path) {
                self.module_paths.push(path);
            }
        }
        for path in other.executable_paths {
            if !self.executable_paths.contains(&path) {
                self.executable_paths.push(path);
            }
        }
    }
}

/// On-disk form of the activation record: environment names only. Paths are
/// recomputed on restore because the runtime tree may have changed.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ActivationState {
    #[serde(default)]
    active: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentStatus {
    pub name: String,
    pub active: bool,
    pub module_count: usize,
}

/// Tracks which runtime environments are active and what each contributed.
///
/// The registry owns the record of activations. It survives the process
/// through [`EnvironmentRegistry::save_state`] and
/// [`EnvironmentRegistry::restore_state`]; paths already present in the
/// search path or executable path are picked up by
/// [`EnvironmentRegistry::detect`].
#[derive(Debug)]
pub struct EnvironmentRegistry {
    runtime_root: PathBuf,
    catalog: EnvironmentCatalog,
    search_path: SearchPath,
    executable_path: ExecutablePath,
    active: BTreeMap<String, Contribution>,
    detected: BTreeSet<String>,
}

impl EnvironmentRegistry {
    pub fn new(
        runtime_root: impl Into<PathBuf>,
        catalog: EnvironmentCatalog,
        search_path: SearchPath,
        executable_path: ExecutablePath,
    ) -> Self {
        Self {
            runtime_root: runtime_root.into(),
            catalog,
            search_path,
            executable_path,
            active: BTreeMap::new(),
            detected: BTreeSet::new(),
        }
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    pub fn executable_path(&self) -> &ExecutablePath {
        &self.executable_path
    }

    pub fn is_active(&self, env: &str) -> bool {
        self.active.contains_key(env)
    }

    pub fn contribution(&self, env: &str) -> Option<&Contribution> {
        self.active.get(env)
    }

    /// Name of the environment `path` belongs to, if it lies under the runtime root.
    fn owning_environment(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.runtime_root).ok()?;
        match rel.components().next()? {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        }
    }

    /// Rebuild the activation record from paths already present.
    ///
    /// Every search path or executable path entry under the runtime root marks
    /// the environment named by its first component as active. `base` is also
    /// active whenever its directory holds module directories.
    pub fn detect(&mut self) -> Result<(), RuntimeEnvError> {
        for path in self.search_path.entries() {
            if let Some(env) = self.owning_environment(&path) {
                let record = self.active.entry(env).or_default();
                if !record.module_paths.contains(&path) {
                    record.module_paths.push(path);
                }
            }
        }
        for path in self.executable_path.entries().to_vec() {
            if let Some(env) = self.owning_environment(&path) {
                let record = self.active.entry(env).or_default();
                if !record.executable_paths.contains(&path) {
                    record.executable_paths.push(path);
                }
            }
        }

        let base_dir = self.runtime_root.join(BASE_ENVIRONMENT);
        let base_modules = list_subdirectories(&base_dir)
            .map_err(|e| RuntimeEnvError::io(e, "list base modules", base_dir.clone()))?;
        if !base_modules.is_empty() {
            self.active.entry(BASE_ENVIRONMENT.to_string()).or_default();
        }
        self.detected.extend(self.active.keys().cloned());

        if !self.active.is_empty() {
            info!(
                "Detected {} active environment(s): {}",
                self.active.len(),
                self.active.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        Ok(())
    }

    /// Paths `env` would contribute, given the catalog and the runtime tree.
    fn planned_contribution(&self, env: &str) -> Result<Contribution, RuntimeEnvError> {
        let env_dir = self.runtime_root.join(env);
        let mut plan = Contribution {
            module_paths: vec![env_dir.clone()],
            executable_paths: Vec::new(),
        };

        match self.catalog.modules(env).filter(|modules| !modules.is_empty()) {
            Some(modules) => {
                for (name, module) in modules {
                    if module.path.as_os_str().is_empty() {
                        debug!("Module '{}' in '{}' has no path, skipping", name, env);
                        continue;
                    }
                    let path = if module.path.is_relative() {
                        env_dir.join(&module.path)
                    } else {
                        module.path.clone()
                    };
                    if !path.exists() {
                        debug!("Module '{}' in '{}' not found at {}", name, env, path.display());
                        continue;
                    }
                    if module.kind == ModuleType::Common {
                        plan.executable_paths.push(path.clone());
                    }
                    plan.module_paths.push(path);
                }
            }
            None => {
                // No recorded modules: expose every subdirectory.
                let dirs = list_subdirectories(&env_dir)
                    .map_err(|e| RuntimeEnvError::io(e, "list environment modules", env_dir.clone()))?;
                plan.module_paths.extend(dirs);
            }
        }
        Ok(plan)
    }

    /// Activate `env`, prepending its paths. Only paths not already present
    /// are recorded, so deactivation never removes someone else's entry.
    pub fn activate(&mut self, env: &str) -> Result<&Contribution, RuntimeEnvError> {
        let env_dir = self.runtime_root.join(env);
        if !env_dir.is_dir() {
            return Err(RuntimeEnvError::UnknownEnvironment {
                name: env.to_string(),
                dir: env_dir,
            });
        }

        let plan = self.planned_contribution(env)?;
        let mut added = Contribution::default();
        for path in plan.module_paths {
            if self.search_path.insert_front(&path) {
                added.module_paths.push(path);
            }
        }
        for path in plan.executable_paths {
            if self.executable_path.insert_front(&path) {
                added.executable_paths.push(path);
            }
        }

        if added.is_empty() {
            info!("Environment '{}' was already active", env);
        } else {
            info!(
                "Activated environment '{}': {} module path(s), {} executable path(s)",
                env,
                added.module_paths.len(),
                added.executable_paths.len()
            );
        }

        let record = self.active.entry(env.to_string()).or_default();
        record.absorb(added);
        Ok(record)
    }

    /// Deactivate `env`, removing what it contributed. For environments picked
    /// up by [`EnvironmentRegistry::detect`] the planned paths are removed too.
    pub fn deactivate(&mut self, env: &str) -> Result<Contribution, RuntimeEnvError> {
        let mut record = self
            .active
            .remove(env)
            .ok_or_else(|| RuntimeEnvError::NotActive(env.to_string()))?;
        if self.detected.remove(env) {
            match self.planned_contribution(env) {
                Ok(plan) => record.absorb(plan),
                Err(e) => debug!("Could not recompute paths for '{}': {}", env, e),
            }
        }

        let mut removed = Contribution::default();
        for path in record.module_paths {
            if self.search_path.remove(&path) {
                removed.module_paths.push(path);
            }
        }
        for path in record.executable_paths {
            if self.executable_path.remove(&path) {
                removed.executable_paths.push(path);
            }
        }
        info!(
            "Deactivated environment '{}': removed {} module path(s), {} executable path(s)",
            env,
            removed.module_paths.len(),
            removed.executable_paths.len()
        );
        Ok(removed)
    }

    /// Startup scan of `<runtime>/base`.
    ///
    /// Directories holding a native library are packages and only join the
    /// search path; any other directory is a common module and joins the
    /// executable path as well. A missing base directory is created.
    pub fn bootstrap_base(&mut self) -> Result<&Contribution, RuntimeEnvError> {
        let base_dir = self.runtime_root.join(BASE_ENVIRONMENT);
        if !base_dir.is_dir() {
            warn!("Runtime base directory {} not found, creating", base_dir.display());
            std::fs::create_dir_all(&base_dir)
                .map_err(|e| RuntimeEnvError::io(e, "create base environment", base_dir.clone()))?;
        }

        let mut added = Contribution::default();
        let modules = list_subdirectories(&base_dir)
            .map_err(|e| RuntimeEnvError::io(e, "list base modules", base_dir.clone()))?;
        for module in modules {
            let is_package = contains_native_library(&module)
                .map_err(|e| RuntimeEnvError::io(e, "inspect base module", module.clone()))?;
            if self.search_path.insert_front(&module) {
                added.module_paths.push(module.clone());
            }
            if !is_package && self.executable_path.insert_front(&module) {
                added.executable_paths.push(module);
            }
        }
        debug!(
            "Base environment bootstrap added {} module path(s), {} executable path(s)",
            added.module_paths.len(),
            added.executable_paths.len()
        );

        let record = self.active.entry(BASE_ENVIRONMENT.to_string()).or_default();
        record.absorb(added);
        Ok(record)
    }

    /// Where [`EnvironmentRegistry::save_state`] keeps the activation record.
    pub fn state_file(&self) -> PathBuf {
        self.runtime_root.join(ACTIVE_ENVIRONMENTS_FILE)
    }

    /// Persist the names of the active environments.
    pub fn save_state(&self) -> Result<(), RuntimeEnvError> {
        let path = self.state_file();
        std::fs::create_dir_all(&self.runtime_root)
            .map_err(|e| RuntimeEnvError::io(e, "create runtime dir", self.runtime_root.clone()))?;
        let state = ActivationState {
            active: self.active.keys().cloned().collect(),
        };
        let content = serde_json::to_string_pretty(&state).map_err(|source| RuntimeEnvError::StateMalformed {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, content).map_err(|e| RuntimeEnvError::io(e, "write activation record", path.clone()))?;
        debug!("Saved activation record to {}", path.display());
        Ok(())
    }

    /// Re-activate every environment named in the saved record and return the
    /// ones that came back. A missing record restores nothing; an environment
    /// whose directory is gone is skipped with a warning.
    pub fn restore_state(&mut self) -> Result<Vec<String>, RuntimeEnvError> {
        let path = self.state_file();
        if !path.is_file() {
            debug!("No activation record at {}", path.display());
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| RuntimeEnvError::io(e, "read activation record", path.clone()))?;
        let state: ActivationState =
            serde_json::from_str(&content).map_err(|source| RuntimeEnvError::StateMalformed {
                path: path.clone(),
                source,
            })?;

        let mut restored = Vec::new();
        for env in state.active {
            match self.activate(&env) {
                Ok(_) => restored.push(env),
                Err(e) => warn!("Cannot restore environment '{}': {}", env, e),
            }
        }
        if !restored.is_empty() {
            info!("Restored environment(s): {}", restored.join(", "));
        }
        Ok(restored)
    }

    /// `base`, then every catalog environment, then any active environment the
    /// catalog does not know about.
    pub fn list(&self) -> Vec<EnvironmentStatus> {
        let status = |name: &str| EnvironmentStatus {
            name: name.to_string(),
            active: self.is_active(name),
            module_count: self.catalog.modules(name).map_or(0, |m| m.len()),
        };

        let mut out = vec![status(BASE_ENVIRONMENT)];
        out.extend(self.catalog.environment_names().map(status));
        for name in self.active.keys() {
            if !out.iter().any(|s| &s.name == name) {
                out.push(status(name));
            }
        }
        out
    }
}
