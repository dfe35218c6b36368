//! Command handlers for the host shell.
//!
//! Each handler prints its results to stdout and problems to stderr, and
//! returns the process exit code.
use std::process::ExitCode;

use log::error;
use tabhost_core::plugin_system::icon::{GhostscriptRasterizer, resolve_vector_icon};
use tabhost_core::plugin_system::{
    BatchActivation, ExecutablePath, Icon, IconSource, PluginActivator, PluginDescriptor, PluginDiscovery,
    PluginSystemError, ScanReport, SearchPath,
};
use tabhost_core::runtime_env::{EnvironmentCatalog, EnvironmentRegistry, ModuleEntry, ModuleType, RuntimeEnvError};
use tabhost_core::{HostConfig, KernelError};

use crate::navigation;

async fn discover(config: &HostConfig) -> ScanReport {
    PluginDiscovery::new(&config.plugins_dir).scan().await
}

/// Registry over the process search paths, with leftovers from earlier
/// sessions detected and the saved activation record restored.
fn open_registry(config: &HostConfig) -> Result<EnvironmentRegistry, RuntimeEnvError> {
    let catalog = EnvironmentCatalog::load(&config.environments_file)?;
    let mut registry = EnvironmentRegistry::new(
        &config.runtime_dir,
        catalog,
        SearchPath::global(),
        ExecutablePath::from_env(),
    );
    registry.detect()?;
    registry.restore_state()?;
    Ok(registry)
}

/// Bootstrap `base`, activate `envs` and publish the executable path.
///
/// Environments are optional for plugins: every failure here is logged and
/// activation goes on without them.
fn prepare_environments(config: &HostConfig, envs: &[String]) {
    let mut registry = match open_registry(config) {
        Ok(registry) => registry,
        Err(e) => {
            error!("{}, continuing without runtime environments", KernelError::from(e));
            return;
        }
    };
    if let Err(e) = registry.bootstrap_base() {
        error!("{}", KernelError::from(e));
    }
    for env in envs {
        if let Err(e) = registry.activate(env) {
            error!("{}", KernelError::from(e));
        }
    }
    if let Err(e) = registry.executable_path().apply_to_process() {
        error!("{}", KernelError::from(RuntimeEnvError::from(e)));
    }
}

fn describe_icon(icon: &IconSource) -> String {
    match icon {
        IconSource::File(path) => path.display().to_string(),
        IconSource::Resource(reference) => reference.clone(),
        IconSource::Default => "default icon".to_string(),
    }
}

fn print_batch(batch: &BatchActivation) {
    for plugin in &batch.activated {
        println!("activated '{}' [{}]", plugin.name, describe_icon(&plugin.icon));
        if let Some(markup) = plugin.unit.as_markup() {
            println!("  {}", markup);
        }
    }
    for failure in &batch.failures {
        match failure {
            PluginSystemError::ActivationFailure {
                plugin, stage, message, ..
            } => println!("failed to load plugin '{}' while {}: {}", plugin, stage, message),
            other => println!("{}", other),
        }
    }
}

pub async fn list_plugins(config: &HostConfig) -> ExitCode {
    let report = discover(config).await;
    if report.descriptors.is_empty() {
        println!("No plugins found in {}", config.plugins_dir.display());
        return ExitCode::SUCCESS;
    }

    for descriptor in &report.descriptors {
        let path = if descriptor.placement.path.is_empty() {
            "(root)"
        } else {
            descriptor.placement.path.as_str()
        };
        println!(
            "{:<24} {:<8} {:<6} {:>6}  {}",
            descriptor.name(),
            descriptor.meta.version,
            descriptor.runtime.kind,
            descriptor.priority(),
            path
        );
    }
    ExitCode::SUCCESS
}

pub async fn print_tree(config: &HostConfig, icons: bool) -> ExitCode {
    let report = discover(config).await;
    print!("{}", navigation::render(&navigation::build_tree(&report.descriptors)));

    if icons {
        let rasterizer = GhostscriptRasterizer::default();
        println!("Icons:");
        for descriptor in &report.descriptors {
            let icon = match resolve_vector_icon(descriptor.directory(), &rasterizer) {
                Icon::Empty => "none".to_string(),
                Icon::Svg(path) => path.display().to_string(),
                Icon::Raster(bytes) => format!("raster image, {} bytes", bytes.len()),
            };
            println!("  {}: {}", descriptor.name(), icon);
        }
    }
    ExitCode::SUCCESS
}

/// Activate the named plugins in priority order. Fails only when no name matched.
pub async fn activate_plugins(config: &HostConfig, names: &[String], envs: &[String]) -> ExitCode {
    let report = discover(config).await;
    for name in names {
        if !report.descriptors.iter().any(|d| d.name() == name) {
            eprintln!("No plugin named '{}'", name);
        }
    }
    let selected: Vec<&PluginDescriptor> = report
        .descriptors
        .iter()
        .filter(|d| names.iter().any(|n| n == d.name()))
        .collect();
    if selected.is_empty() {
        return ExitCode::FAILURE;
    }

    prepare_environments(config, envs);
    let batch = PluginActivator::native().activate_all(selected);
    print_batch(&batch);
    ExitCode::SUCCESS
}

/// Default run: discover, show the tree, activate everything.
pub async fn run_session(config: &HostConfig) -> ExitCode {
    let report = discover(config).await;
    print!("{}", navigation::render(&navigation::build_tree(&report.descriptors)));

    prepare_environments(config, &[]);
    let batch = PluginActivator::native().activate_all(&report.descriptors);
    print_batch(&batch);
    println!(
        "{} plugin(s) activated, {} failed",
        batch.activated.len(),
        batch.failures.len()
    );
    ExitCode::SUCCESS
}

pub fn list_environments(config: &HostConfig) -> ExitCode {
    let registry = match open_registry(config) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    for status in registry.list() {
        println!(
            "{:<16} {:<8} {} module(s)",
            status.name,
            if status.active { "active" } else { "inactive" },
            status.module_count
        );
    }
    ExitCode::SUCCESS
}

pub fn activate_environment(config: &HostConfig, name: &str) -> ExitCode {
    let result = open_registry(config).and_then(|mut registry| {
        let contribution = registry.activate(name)?.clone();
        registry.save_state()?;
        registry.executable_path().apply_to_process()?;
        Ok(contribution)
    });
    match result {
        Ok(contribution) => {
            println!(
                "Environment '{}' active: {} module path(s), {} executable path(s)",
                name,
                contribution.module_paths.len(),
                contribution.executable_paths.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

pub fn deactivate_environment(config: &HostConfig, name: &str) -> ExitCode {
    let result = open_registry(config).and_then(|mut registry| {
        let removed = registry.deactivate(name)?;
        registry.save_state()?;
        registry.executable_path().apply_to_process()?;
        Ok(removed)
    });
    match result {
        Ok(removed) => {
            println!(
                "Environment '{}' deactivated: removed {} module path(s), {} executable path(s)",
                name,
                removed.module_paths.len(),
                removed.executable_paths.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load the catalog, apply `edit` and save it back. `edit` returns the
/// message to print, or the reason the edit was refused.
fn edit_catalog(
    config: &HostConfig,
    edit: impl FnOnce(&mut EnvironmentCatalog) -> Result<String, String>,
) -> ExitCode {
    let path = &config.environments_file;
    let mut catalog = match EnvironmentCatalog::load(path) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let message = match edit(&mut catalog) {
        Ok(message) => message,
        Err(reason) => {
            eprintln!("{}", reason);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = catalog.save(path) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }
    println!("{}", message);
    ExitCode::SUCCESS
}

pub fn create_environment(config: &HostConfig, name: &str) -> ExitCode {
    let env_dir = config.runtime_dir.join(name);
    if let Err(e) = std::fs::create_dir_all(&env_dir) {
        eprintln!("Cannot create {}: {}", env_dir.display(), e);
        return ExitCode::FAILURE;
    }
    edit_catalog(config, |catalog| {
        if catalog.add_environment(name) {
            Ok(format!("Environment '{}' created at {}", name, env_dir.display()))
        } else {
            Err(format!("Environment '{}' already exists", name))
        }
    })
}

/// Drop `name` from the catalog. Its directory is left in place.
pub fn delete_environment(config: &HostConfig, name: &str) -> ExitCode {
    edit_catalog(config, |catalog| match catalog.remove_environment(name) {
        Some(modules) => Ok(format!("Environment '{}' removed ({} module(s))", name, modules.len())),
        None => Err(format!("No environment named '{}'", name)),
    })
}

pub fn add_module(config: &HostConfig, env: &str, module: &str, entry: ModuleEntry) -> ExitCode {
    let kind = match entry.kind {
        ModuleType::Package => "package",
        ModuleType::Common => "common",
    };
    edit_catalog(config, |catalog| {
        if catalog.add_module(env, module, entry) {
            Ok(format!("Module '{}' ({}) recorded in '{}'", module, kind, env))
        } else {
            Err(format!("No environment named '{}'", env))
        }
    })
}

pub fn remove_module(config: &HostConfig, env: &str, module: &str) -> ExitCode {
    edit_catalog(config, |catalog| match catalog.remove_module(env, module) {
        Some(_) => Ok(format!("Module '{}' removed from '{}'", module, env)),
        None => Err(format!("No module '{}' in '{}'", module, env)),
    })
}
