//! # Tabhost Plugin System
//!
//! Discovers plugin installations on disk, normalizes their configuration
//! into [`PluginDescriptor`]s and activates them on demand.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`config_parser`]**: locates `settings.json` / `settings.ini` in a plugin
//!   directory and parses it into a format-specific raw record.
//! - **[`normalizer`]**: applies defaults and validation, producing descriptors.
//!   The navigation-root rule for key/value files is applied here, explicitly.
//! - **[`discovery`]**: scans the discovery root ([`PluginDiscovery`]) and sorts
//!   the result by priority.
//! - **[`strategy`]**: one [`LoadStrategy`](strategy::LoadStrategy) per plugin kind,
//!   resolving a module locator to a module file.
//! - **[`ffi`]**: the C ABI native modules export, with both the plugin-side
//!   exporter and the host-side wrapper.
//! - **[`activator`]**: loads, constructs and runs a plugin ([`PluginActivator`]),
//!   supplying only the constructor capabilities a class declares.
//! - **[`icon`]**: icon file selection and rasterization.
//! - **[`search_path`]**: the process-wide module search path.
//! - **[`traits`]**: the contracts plugin code implements.
pub mod activator;
pub mod config_parser;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod ffi;
pub mod icon;
pub mod normalizer;
pub mod search_path;
pub mod strategy;
pub mod traits;

pub use activator::{ActivatedPlugin, BatchActivation, PluginActivator};
pub use descriptor::{EntryPoint, PluginDescriptor, PluginKind, SourceFormat};
pub use discovery::{PluginDiscovery, ScanReport, scan_plugins};
pub use error::{ActivationStage, PluginSystemError};
pub use ffi::{NativeModuleLoader, export_module};
pub use icon::{Icon, IconSource};
pub use search_path::{ExecutablePath, SearchPath};
pub use strategy::ModuleLoader;
pub use traits::{
    Capability, CapabilitySet, ClassTable, ConstructorArgs, DisplayUnit, PanelPlugin, PluginClass, PluginError,
    PluginModule,
};

#[cfg(test)]
mod tests;
