#![cfg(test)]

use std::ffi::{c_char, c_void};
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;

use crate::plugin_system::descriptor::PluginKind;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::ffi::{
    FfiConstructorArgs, FfiModuleVTable, FfiPanelVTable, FfiResult, NativeModule, NativeModuleLoader, export_module,
};
use crate::plugin_system::strategy::ModuleLoader;
use crate::plugin_system::tests::sample_descriptor;
use crate::plugin_system::traits::{
    Capability, CapabilitySet, ClassTable, ConstructorArgs, DisplayUnit, PanelPlugin, PluginClass, PluginError,
    PluginModule,
};

struct Greeter {
    greeting: String,
    plugin_path: Option<PathBuf>,
}

impl PanelPlugin for Greeter {
    fn run(&mut self) -> Result<DisplayUnit, PluginError> {
        let location = self
            .plugin_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        Ok(DisplayUnit::markup(format!("<p>{}</p><p>{}</p>", self.greeting, location)))
    }

    fn plugin_path_slot(&mut self) -> Option<&mut Option<PathBuf>> {
        Some(&mut self.plugin_path)
    }
}

struct GreeterClass;

impl PluginClass for GreeterClass {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::empty().with(Capability::Config)
    }

    fn construct(&self, args: ConstructorArgs) -> Result<Box<dyn PanelPlugin>, PluginError> {
        let config = args.config.ok_or(PluginError::MissingArgument("config"))?;
        Ok(Box::new(Greeter {
            greeting: format!("Hello from {}", config.name()),
            plugin_path: None,
        }))
    }
}

struct RefusingClass;

impl PluginClass for RefusingClass {
    fn construct(&self, _args: ConstructorArgs) -> Result<Box<dyn PanelPlugin>, PluginError> {
        Err(PluginError::Construction("refusing to start".to_string()))
    }
}

struct OpaquePanel;

impl PanelPlugin for OpaquePanel {
    fn run(&mut self) -> Result<DisplayUnit, PluginError> {
        Ok(DisplayUnit::new(42u32))
    }
}

struct PanicPanel;

impl PanelPlugin for PanicPanel {
    fn run(&mut self) -> Result<DisplayUnit, PluginError> {
        panic!("inside the module");
    }
}

struct SimpleClass<F: Fn() -> Box<dyn PanelPlugin> + Send + Sync>(F);

impl<F: Fn() -> Box<dyn PanelPlugin> + Send + Sync> PluginClass for SimpleClass<F> {
    fn construct(&self, _args: ConstructorArgs) -> Result<Box<dyn PanelPlugin>, PluginError> {
        Ok((self.0)())
    }
}

fn in_process_module() -> NativeModule {
    let table = ClassTable::new()
        .with("Greeter", GreeterClass)
        .with("Refusing", RefusingClass)
        .with("Opaque", SimpleClass(|| Box::new(OpaquePanel) as Box<dyn PanelPlugin>))
        .with("Panic", SimpleClass(|| Box::new(PanicPanel) as Box<dyn PanelPlugin>));
    let vtable = export_module(table);
    unsafe { NativeModule::from_raw(vtable, "in-process", None) }.expect("non-null vtable")
}

#[test]
fn test_class_lookup_and_capabilities_cross_the_boundary() {
    let module = in_process_module();
    assert!(module.class("Missing").is_none());

    let class = module.class("Greeter").expect("class exists");
    assert_eq!(class.capabilities(), CapabilitySet::empty().with(Capability::Config));
    assert!(module.class("Refusing").expect("class exists").capabilities().is_empty());
}

#[test]
fn test_construct_run_and_backfill() {
    let module = in_process_module();
    let descriptor = sample_descriptor(Path::new("/plugins/greeter"), "Greeter", PluginKind::Simple, "g:Greeter");
    let class = module.class("Greeter").unwrap();

    let mut panel = class
        .construct(ConstructorArgs::negotiate(class.capabilities(), &descriptor))
        .expect("construct should succeed");
    assert!(panel.backfill_plugin_path(Path::new("/plugins/greeter")));
    assert!(!panel.backfill_plugin_path(Path::new("/elsewhere")));

    let unit = panel.run().expect("run should succeed");
    assert_eq!(
        unit.as_markup(),
        Some("<p>Hello from Greeter</p><p>/plugins/greeter</p>")
    );
}

#[test]
fn test_plugin_errors_keep_their_message() {
    let module = in_process_module();

    let err = module
        .class("Greeter")
        .unwrap()
        .construct(ConstructorArgs::default())
        .err()
        .expect("missing config should fail");
    assert_eq!(err, PluginError::Construction("Missing constructor argument: config".to_string()));

    let err = module
        .class("Refusing")
        .unwrap()
        .construct(ConstructorArgs::default())
        .err()
        .expect("should refuse");
    assert_eq!(err, PluginError::Construction("Plugin construction error: refusing to start".to_string()));
}

#[test]
fn test_run_failures_cross_the_boundary() {
    let module = in_process_module();

    let mut opaque = module.class("Opaque").unwrap().construct(ConstructorArgs::default()).unwrap();
    assert_eq!(
        opaque.run().unwrap_err(),
        PluginError::Run("display unit is not markup text".to_string())
    );

    let mut panicking = module.class("Panic").unwrap().construct(ConstructorArgs::default()).unwrap();
    assert_eq!(panicking.run().unwrap_err(), PluginError::Run("module returned Panic".to_string()));
}

#[test]
fn test_panels_keep_module_alive() {
    let module = in_process_module();
    let class = module.class("Opaque").unwrap();
    let panel = class.construct(ConstructorArgs::default()).unwrap();
    drop(class);
    drop(module);
    drop(panel);
}

// A hand-built module declaring a capability bit the host does not know.

extern "C" fn future_capabilities(_instance: *const c_void, _class: *const c_char, out_mask: *mut u32) -> FfiResult {
    unsafe { *out_mask = 0b101 };
    FfiResult::Ok
}

extern "C" fn never_construct(
    _instance: *const c_void,
    _class: *const c_char,
    _args: *const FfiConstructorArgs,
    _out_panel: *mut *mut FfiPanelVTable,
    _out_error: *mut *mut c_char,
) -> FfiResult {
    panic!("construct must not be reached");
}

extern "C" fn noop_free(_ptr: *mut c_char) {}

extern "C" fn free_vtable(vtable: *mut FfiModuleVTable) {
    unsafe { drop(Box::from_raw(vtable)) };
}

#[test]
fn test_unknown_capability_bits_fail_construction() {
    let vtable = Box::into_raw(Box::new(FfiModuleVTable {
        instance: std::ptr::null_mut(),
        class_capabilities: future_capabilities,
        construct: never_construct,
        free_string: noop_free,
        destroy: free_vtable,
    }));
    let module = unsafe { NativeModule::from_raw(vtable, "future", None) }.unwrap();
    let class = module.class("Anything").expect("class exists");

    assert_eq!(class.capabilities(), CapabilitySet::empty().with(Capability::Config));
    let err = class.construct(ConstructorArgs::default()).err().expect("should fail");
    match err {
        PluginError::Construction(message) => assert!(message.contains("unknown capabilities")),
        other => panic!("Expected construction error, got {:?}", other),
    }
}

#[test]
fn test_null_vtable_is_rejected() {
    let result = unsafe { NativeModule::from_raw(std::ptr::null_mut(), "null", None) };
    assert!(matches!(result, Err(PluginSystemError::FfiError { .. })));
}

#[test]
fn test_loader_reports_unloadable_files() {
    let tmp = tempdir().unwrap();
    let loader = NativeModuleLoader::new();

    let err = loader.load_file(&tmp.path().join("absent.so")).err().expect("should fail");
    assert!(matches!(err, PluginSystemError::FfiError { ref operation, .. } if operation == "open"));

    let garbage = tmp.path().join(libloading::library_filename("garbage"));
    fs::write(&garbage, b"definitely not a shared library").unwrap();
    let err = loader.load_file(&garbage).err().expect("should fail");
    assert!(matches!(err, PluginSystemError::FfiError { .. }));
}
