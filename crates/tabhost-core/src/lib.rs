// Declare the subsystems of the host core
pub mod kernel;
pub mod plugin_system;
pub mod runtime_env;
pub mod storage;
pub mod utils;

// Re-export key public types for the host binary and plugin modules
pub use kernel::error::Error as KernelError;
pub use plugin_system::{
    PluginActivator, PluginDescriptor, PluginDiscovery, PanelPlugin, PluginClass, PluginModule,
};
pub use runtime_env::EnvironmentRegistry;
pub use storage::config::HostConfig;
