//! Example native panel module.
//!
//! Exports two classes through `_tabhost_module_init`:
//! - `Greeting` asks for its configuration and greets by plugin name.
//! - `DirectoryPanel` asks for nothing and relies on the host back-filling
//!   its plugin path.
use std::path::PathBuf;

use tabhost_core::plugin_system::ffi::FfiModuleVTable;
use tabhost_core::plugin_system::{
    Capability, CapabilitySet, ClassTable, ConstructorArgs, DisplayUnit, PanelPlugin, PluginClass, PluginError,
    export_module,
};

struct Greeting {
    name: String,
    description: String,
}

impl PanelPlugin for Greeting {
    fn run(&mut self) -> Result<DisplayUnit, PluginError> {
        Ok(DisplayUnit::markup(format!(
            "<h1>Hello from {}</h1><p>{}</p>",
            self.name, self.description
        )))
    }
}

pub struct GreetingClass;

impl PluginClass for GreetingClass {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::empty().with(Capability::Config)
    }

    fn construct(&self, args: ConstructorArgs) -> Result<Box<dyn PanelPlugin>, PluginError> {
        let config = args.config.ok_or(PluginError::MissingArgument("config"))?;
        Ok(Box::new(Greeting {
            name: config.meta.name,
            description: config.meta.description,
        }))
    }
}

#[derive(Default)]
struct DirectoryPanel {
    plugin_path: Option<PathBuf>,
}

impl PanelPlugin for DirectoryPanel {
    fn run(&mut self) -> Result<DisplayUnit, PluginError> {
        let path = self
            .plugin_path
            .as_ref()
            .ok_or_else(|| PluginError::Run("plugin path was never set".to_string()))?;
        Ok(DisplayUnit::markup(format!("<p>Installed at {}</p>", path.display())))
    }

    fn plugin_path_slot(&mut self) -> Option<&mut Option<PathBuf>> {
        Some(&mut self.plugin_path)
    }
}

pub struct DirectoryClass;

impl PluginClass for DirectoryClass {
    fn construct(&self, _args: ConstructorArgs) -> Result<Box<dyn PanelPlugin>, PluginError> {
        Ok(Box::new(DirectoryPanel::default()))
    }
}

/// The classes this module exports.
pub fn classes() -> ClassTable {
    ClassTable::new()
        .with("Greeting", GreetingClass)
        .with("DirectoryPanel", DirectoryClass)
}

#[unsafe(no_mangle)]
pub extern "C-unwind" fn _tabhost_module_init() -> *mut FfiModuleVTable {
    export_module(classes())
}

#[cfg(test)]
mod tests;
