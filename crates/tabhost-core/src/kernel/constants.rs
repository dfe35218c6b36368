/// Application name
pub const APP_NAME: &str = "Tabhost";

/// Application version
pub const APP_VERSION: &str = "0.1.0";

/// Default plugins directory (the discovery root)
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Default runtime environments directory
pub const DEFAULT_RUNTIME_DIR: &str = "runtime";

/// Name of the always-present runtime environment
pub const BASE_ENVIRONMENT: &str = "base";

/// Environment catalog file name inside the runtime directory
pub const ENVIRONMENTS_FILE: &str = "environments.json";

/// Names of the environments left active, inside the runtime directory
pub const ACTIVE_ENVIRONMENTS_FILE: &str = "active.json";

/// Default host configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config/settings.toml";

/// Structured-data plugin configuration file name
pub const STRUCTURED_CONFIG_FILE: &str = "settings.json";

/// Key/value-sections plugin configuration file name
pub const SECTIONS_CONFIG_FILE: &str = "settings.ini";

/// Navigation root segment that key/value configs are placed under
pub const NAVIGATION_ROOT: &str = "Plugins";

/// Conventional icon looked up inside a plugin directory at display time
pub const CONVENTIONAL_ICON: &str = "icon/Metro_usual.svg";

/// Prefix marking an icon reference as an in-process resource
pub const RESOURCE_PREFIX: &str = ":/";

/// Symbol every native plugin module exports
pub const MODULE_INIT_SYMBOL: &str = "_tabhost_module_init";
