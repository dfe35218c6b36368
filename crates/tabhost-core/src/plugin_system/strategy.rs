//! Load strategies: how a descriptor's module locator becomes a loaded module.
//!
//! One implementation per [`PluginKind`]. Adding a kind means adding a
//! strategy here and a variant there; nothing else branches on the kind.
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::plugin_system::descriptor::{PluginDescriptor, PluginKind};
use crate::plugin_system::error::{ActivationStage, PluginSystemError};
use crate::plugin_system::search_path::SearchPath;
use crate::plugin_system::traits::PluginModule;

/// Turns a module file into a [`PluginModule`].
///
/// The native implementation is [`crate::plugin_system::ffi::NativeModuleLoader`];
/// tests and embedding hosts supply their own.
pub trait ModuleLoader: Send + Sync {
    fn load_file(&self, path: &Path) -> Result<Arc<dyn PluginModule>, PluginSystemError>;
}

/// Everything a strategy may touch while loading.
pub struct LoadContext<'a> {
    pub loader: &'a dyn ModuleLoader,
    pub search_path: &'a SearchPath,
}

pub trait LoadStrategy: Send + Sync {
    fn kind(&self) -> PluginKind;

    /// Locate the file behind `descriptor`'s module locator without loading it.
    fn locate(&self, descriptor: &PluginDescriptor, ctx: &LoadContext<'_>) -> Result<PathBuf, PluginSystemError>;

    fn load_module(
        &self,
        descriptor: &PluginDescriptor,
        ctx: &LoadContext<'_>,
    ) -> Result<Arc<dyn PluginModule>, PluginSystemError> {
        let path = self.locate(descriptor, ctx)?;
        debug!(
            "Loading module for plugin '{}' from {} ({} strategy)",
            descriptor.name(),
            path.display(),
            self.kind()
        );
        ctx.loader
            .load_file(&path)
            .map_err(|e| e.into_activation(descriptor.name(), ActivationStage::LoadModule))
    }
}

/// Module locator is a file path relative to the plugin directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleStrategy;

impl LoadStrategy for SimpleStrategy {
    fn kind(&self) -> PluginKind {
        PluginKind::Simple
    }

    fn locate(&self, descriptor: &PluginDescriptor, _ctx: &LoadContext<'_>) -> Result<PathBuf, PluginSystemError> {
        let name = descriptor.name();
        let locator = Path::new(descriptor.runtime.entry_point.module());

        let escapes = locator.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if locator.is_absolute() || escapes {
            return Err(PluginSystemError::activation(
                name,
                ActivationStage::ResolveEntryPoint,
                format!("module path '{}' must stay inside the plugin directory", locator.display()),
            ));
        }

        let candidate = descriptor.directory().join(locator);
        if candidate.is_file() {
            return Ok(candidate);
        }

        // `panel` resolves to `libpanel.so` / `panel.dll` next to where `panel` would be.
        if let (Some(parent), Some(stem)) = (candidate.parent(), candidate.file_name()) {
            let platform = parent.join(libloading::library_filename(stem));
            if platform.is_file() {
                return Ok(platform);
            }
        }

        Err(PluginSystemError::activation(
            name,
            ActivationStage::LoadModule,
            format!("module file '{}' not found", candidate.display()),
        ))
    }
}

/// Plugin directory is a package root on the process-wide search path;
/// the module locator is a dotted module name.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolyStrategy;

impl PolyStrategy {
    /// `a.b.panel` becomes `a/b/<platform library name of panel>`.
    fn relative_module_path(dotted: &str) -> Option<PathBuf> {
        let segments: Vec<&str> = dotted.split('.').collect();
        let valid = segments
            .iter()
            .all(|s| !s.is_empty() && !s.contains(['/', '\\']));
        if !valid {
            return None;
        }
        let (last, packages) = segments.split_last()?;
        let mut path: PathBuf = packages.iter().collect();
        path.push(libloading::library_filename(last));
        Some(path)
    }
}

impl LoadStrategy for PolyStrategy {
    fn kind(&self) -> PluginKind {
        PluginKind::Poly
    }

    fn locate(&self, descriptor: &PluginDescriptor, ctx: &LoadContext<'_>) -> Result<PathBuf, PluginSystemError> {
        let name = descriptor.name();
        let dotted = descriptor.runtime.entry_point.module();

        // Never removed again; later activations may rely on the entry.
        ctx.search_path.insert_front(descriptor.directory());

        let relative = Self::relative_module_path(dotted).ok_or_else(|| {
            PluginSystemError::activation(
                name,
                ActivationStage::ResolveEntryPoint,
                format!("'{}' is not a valid dotted module name", dotted),
            )
        })?;

        let entries = ctx.search_path.entries();
        entries
            .iter()
            .map(|entry| entry.join(&relative))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                PluginSystemError::activation(
                    name,
                    ActivationStage::LoadModule,
                    format!(
                        "module '{}' not found in {} search path entries",
                        dotted,
                        entries.len()
                    ),
                )
            })
    }
}
