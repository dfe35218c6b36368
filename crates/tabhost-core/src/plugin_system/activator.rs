//! Turns a descriptor into a running plugin instance.
//!
//! Activation walks a fixed sequence: load the module through the kind's
//! strategy, look up the entry-point class, negotiate constructor
//! capabilities, construct, back-fill the plugin path, run. Any error or panic
//! along the way becomes an `ActivationFailure` tagged with the stage; the
//! host decides how to show it.
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, info};

use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::error::{ActivationStage, PluginSystemError, PluginSystemErrorSource, panic_message};
use crate::plugin_system::ffi::NativeModuleLoader;
use crate::plugin_system::icon::{IconSource, display_icon};
use crate::plugin_system::search_path::SearchPath;
use crate::plugin_system::strategy::{LoadContext, ModuleLoader};
use crate::plugin_system::traits::{ConstructorArgs, DisplayUnit, PanelPlugin, PluginError, PluginModule};

/// A successfully activated plugin.
///
/// Field order is drop order: the display unit and instance are released
/// before the module that provided their code.
pub struct ActivatedPlugin {
    pub name: String,
    pub icon: IconSource,
    pub unit: DisplayUnit,
    pub instance: Box<dyn PanelPlugin>,
    _module: Arc<dyn PluginModule>,
}

impl std::fmt::Debug for ActivatedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivatedPlugin")
            .field("name", &self.name)
            .field("icon", &self.icon)
            .field("unit", &self.unit)
            .finish_non_exhaustive()
    }
}

/// Outcome of activating several plugins in sequence.
#[derive(Debug, Default)]
pub struct BatchActivation {
    pub activated: Vec<ActivatedPlugin>,
    pub failures: Vec<PluginSystemError>,
}

pub struct PluginActivator {
    loader: Arc<dyn ModuleLoader>,
    search_path: SearchPath,
}

impl PluginActivator {
    pub fn new(loader: Arc<dyn ModuleLoader>, search_path: SearchPath) -> Self {
        Self { loader, search_path }
    }

    /// Activator loading native libraries against the process-wide search path.
    pub fn native() -> Self {
        Self::new(Arc::new(NativeModuleLoader::new()), SearchPath::global())
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    /// Activate one plugin. Failures are logged here and returned to the caller.
    pub fn activate(&self, descriptor: &PluginDescriptor) -> Result<ActivatedPlugin, PluginSystemError> {
        match self.try_activate(descriptor) {
            Ok(activated) => {
                info!("Activated plugin '{}'", activated.name);
                Ok(activated)
            }
            Err(e) => {
                error!("{}", e);
                Err(e)
            }
        }
    }

    /// Activate each descriptor in order; a failure never stops the batch.
    pub fn activate_all<'a>(&self, descriptors: impl IntoIterator<Item = &'a PluginDescriptor>) -> BatchActivation {
        let mut batch = BatchActivation::default();
        for descriptor in descriptors {
            match self.activate(descriptor) {
                Ok(activated) => batch.activated.push(activated),
                Err(e) => batch.failures.push(e),
            }
        }
        batch
    }

    fn try_activate(&self, descriptor: &PluginDescriptor) -> Result<ActivatedPlugin, PluginSystemError> {
        let name = descriptor.name();
        let entry_point = &descriptor.runtime.entry_point;
        let ctx = LoadContext {
            loader: self.loader.as_ref(),
            search_path: &self.search_path,
        };

        let strategy = descriptor.runtime.kind.strategy();
        let module = guarded(name, ActivationStage::LoadModule, || strategy.load_module(descriptor, &ctx))?;

        let class = guarded(name, ActivationStage::LookupClass, || Ok(module.class(entry_point.class())))?
            .ok_or_else(|| {
                PluginSystemError::activation(
                    name,
                    ActivationStage::LookupClass,
                    format!("module '{}' has no class '{}'", entry_point.module(), entry_point.class()),
                )
            })?;

        let declared = guarded(name, ActivationStage::NegotiateCapabilities, || Ok(class.capabilities()))?;
        debug!(
            "Plugin '{}' declares capabilities [{}]",
            name,
            declared.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ")
        );
        let args = ConstructorArgs::negotiate(declared, descriptor);

        let mut instance = guarded(name, ActivationStage::Construct, || {
            class
                .construct(args)
                .map_err(|e| plugin_failure(name, ActivationStage::Construct, e))
        })?;

        // Back-fill belongs to construction: a panicking slot fails the Construct stage.
        let backfilled = guarded(name, ActivationStage::Construct, || {
            Ok(instance.backfill_plugin_path(descriptor.directory()))
        })?;
        if backfilled {
            debug!("Back-filled plugin path of '{}'", name);
        }

        let unit = guarded(name, ActivationStage::Run, || {
            instance
                .run()
                .map_err(|e| plugin_failure(name, ActivationStage::Run, e))
        })?;

        Ok(ActivatedPlugin {
            name: name.to_string(),
            icon: display_icon(descriptor),
            unit,
            instance,
            _module: module,
        })
    }
}

/// Run one activation stage, converting errors and panics into `ActivationFailure`.
fn guarded<T>(
    plugin: &str,
    stage: ActivationStage,
    f: impl FnOnce() -> Result<T, PluginSystemError>,
) -> Result<T, PluginSystemError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.map_err(|e| e.into_activation(plugin, stage)),
        Err(payload) => Err(PluginSystemError::activation(
            plugin,
            stage,
            format!("panic: {}", panic_message(payload.as_ref())),
        )),
    }
}

fn plugin_failure(plugin: &str, stage: ActivationStage, error: PluginError) -> PluginSystemError {
    PluginSystemError::ActivationFailure {
        plugin: plugin.to_string(),
        stage,
        message: error.to_string(),
        source: Some(Box::new(PluginSystemErrorSource::Plugin(error))),
    }
}
