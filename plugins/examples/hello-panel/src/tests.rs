use std::path::Path;
use std::sync::Arc;

use tabhost_core::plugin_system::ffi::NativeModule;
use tabhost_core::plugin_system::{
    ModuleLoader, PluginActivator, PluginModule, PluginSystemError, SearchPath, scan_plugins,
};
use tempfile::tempdir;

use super::*;

/// Loads this crate's module through its exported init function, so the
/// host side talks to it over the C ABI exactly as with a loaded library.
struct ExportedLoader;

impl ModuleLoader for ExportedLoader {
    fn load_file(&self, path: &Path) -> Result<Arc<dyn PluginModule>, PluginSystemError> {
        // SAFETY: the vtable comes straight from this crate's exporter.
        let module = unsafe { NativeModule::from_raw(_tabhost_module_init(), path.display().to_string(), None)? };
        Ok(Arc::new(module))
    }
}

#[test]
fn exports_both_classes() {
    assert_eq!(classes().class_names(), vec!["DirectoryPanel", "Greeting"]);
}

#[test]
fn directory_panel_needs_its_path() {
    let class = DirectoryClass;
    let mut panel = class.construct(ConstructorArgs::default()).unwrap();
    assert!(matches!(panel.run(), Err(PluginError::Run(_))));
    assert!(panel.backfill_plugin_path(Path::new("/opt/hello")));
    let unit = panel.run().unwrap();
    assert_eq!(unit.as_markup(), Some("<p>Installed at /opt/hello</p>"));
}

#[test]
fn greeting_requires_config() {
    assert!(matches!(
        GreetingClass.construct(ConstructorArgs::default()),
        Err(PluginError::MissingArgument("config"))
    ));
}

#[tokio::test]
async fn bundled_settings_activate_over_the_module_abi() {
    let root = tempdir().unwrap();
    let dir = root.path().join("hello-panel");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::copy(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("settings.json"),
        dir.join("settings.json"),
    )
    .unwrap();
    // Stand-in for the built library next to the settings file.
    std::fs::write(dir.join(libloading_name()), b"").unwrap();

    let descriptors = scan_plugins(root.path()).await;
    assert_eq!(descriptors.len(), 2);

    let activator = PluginActivator::new(Arc::new(ExportedLoader), SearchPath::new());
    let batch = activator.activate_all(&descriptors);
    assert!(batch.failures.is_empty(), "{:?}", batch.failures);

    let greeting = &batch.activated[0];
    assert_eq!(greeting.name, "Hello Greeting");
    assert_eq!(
        greeting.unit.as_markup(),
        Some("<h1>Hello from Hello Greeting</h1><p>Greets whoever opens the tab</p>")
    );

    let directory = &batch.activated[1];
    assert_eq!(
        directory.unit.as_markup().map(str::to_string),
        Some(format!("<p>Installed at {}</p>", dir.display()))
    );
}

fn libloading_name() -> String {
    format!(
        "{}hello_panel{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    )
}
