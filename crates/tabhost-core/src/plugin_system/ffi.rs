//! C ABI shared by the host and native plugin modules.
//!
//! A module library exports `_tabhost_module_init`, returning a heap-allocated
//! [`FfiModuleVTable`]. The host asks the vtable which capabilities a class
//! declares, constructs instances (receiving an [`FfiPanelVTable`] per
//! instance) and finally destroys both. Strings handed across the boundary
//! are owned by the side that allocated them and released through the
//! vtable's `free_string`.
//!
//! Both halves live in this file: [`export_module`] is used by plugin crates,
//! [`NativeModule`] and [`NativeModuleLoader`] by the host.
use std::ffi::{CStr, CString, c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::Arc;

use libloading::{Library, Symbol};
use log::{debug, error, warn};

use crate::kernel::constants::MODULE_INIT_SYMBOL;
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::error::{PluginSystemError, PluginSystemErrorSource, panic_message};
use crate::plugin_system::strategy::ModuleLoader;
use crate::plugin_system::traits::{
    CapabilitySet, ConstructorArgs, DisplayUnit, PanelPlugin, PluginClass, PluginError, PluginModule,
};

/// Status code returned by every vtable function
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResult {
    Ok = 0,
    NullPointer = 1,
    Utf8Error = 2,
    NotFound = 3,
    InvalidArgument = 4,
    PluginError = 5,
    Panic = 6,
}

/// Constructor arguments; a null pointer means the capability was not declared.
#[repr(C)]
pub struct FfiConstructorArgs {
    /// Descriptor serialized as JSON
    pub config_json: *const c_char,
    pub plugin_path: *const c_char,
}

#[repr(C)]
pub struct FfiModuleVTable {
    pub instance: *mut c_void,
    /// Writes the declared capability bits of `class`; `NotFound` for unknown classes.
    pub class_capabilities:
        extern "C" fn(instance: *const c_void, class: *const c_char, out_mask: *mut u32) -> FfiResult,
    pub construct: extern "C" fn(
        instance: *const c_void,
        class: *const c_char,
        args: *const FfiConstructorArgs,
        out_panel: *mut *mut FfiPanelVTable,
        out_error: *mut *mut c_char,
    ) -> FfiResult,
    pub free_string: extern "C" fn(ptr: *mut c_char),
    /// Releases the instance and the vtable itself.
    pub destroy: extern "C" fn(vtable: *mut FfiModuleVTable),
}

#[repr(C)]
pub struct FfiPanelVTable {
    pub instance: *mut c_void,
    /// On success writes the display unit as markup text.
    pub run: extern "C" fn(instance: *mut c_void, out_markup: *mut *mut c_char, out_error: *mut *mut c_char) -> FfiResult,
    /// `Ok` when an unset plugin path slot was filled, `NotFound` otherwise.
    pub backfill_plugin_path: extern "C" fn(instance: *mut c_void, path: *const c_char) -> FfiResult,
    pub free_string: extern "C" fn(ptr: *mut c_char),
    pub destroy: extern "C" fn(vtable: *mut FfiPanelVTable),
}

/// Signature of the `_tabhost_module_init` export
pub type ModuleInitFn = unsafe extern "C-unwind" fn() -> *mut FfiModuleVTable;

// --- Plugin side ---

/// Wrap `module` in a vtable suitable for returning from `_tabhost_module_init`.
pub fn export_module(module: impl PluginModule + 'static) -> *mut FfiModuleVTable {
    let instance: Box<Box<dyn PluginModule>> = Box::new(Box::new(module));
    Box::into_raw(Box::new(FfiModuleVTable {
        instance: Box::into_raw(instance) as *mut c_void,
        class_capabilities: module_class_capabilities,
        construct: module_construct,
        free_string: free_ffi_string,
        destroy: module_destroy,
    }))
}

fn export_panel(panel: Box<dyn PanelPlugin>) -> *mut FfiPanelVTable {
    let instance: Box<Box<dyn PanelPlugin>> = Box::new(panel);
    Box::into_raw(Box::new(FfiPanelVTable {
        instance: Box::into_raw(instance) as *mut c_void,
        run: panel_run,
        backfill_plugin_path: panel_backfill_plugin_path,
        free_string: free_ffi_string,
        destroy: panel_destroy,
    }))
}

/// Run `f`, turning a panic into `FfiResult::Panic` so it never unwinds into the host.
fn guard(f: impl FnOnce() -> Result<(), FfiResult>) -> FfiResult {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => FfiResult::Ok,
        Ok(Err(code)) => code,
        Err(_) => FfiResult::Panic,
    }
}

/// # Safety
/// `ptr` must be null or a valid NUL-terminated string.
unsafe fn str_from_ptr<'a>(ptr: *const c_char) -> Result<&'a str, FfiResult> {
    if ptr.is_null() {
        return Err(FfiResult::NullPointer);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FfiResult::Utf8Error)
}

/// # Safety
/// `ptr` must be null or a valid NUL-terminated string.
unsafe fn opt_str_from_ptr<'a>(ptr: *const c_char) -> Result<Option<&'a str>, FfiResult> {
    if ptr.is_null() {
        Ok(None)
    } else {
        unsafe { str_from_ptr(ptr) }.map(Some)
    }
}

fn write_string(out: *mut *mut c_char, text: &str) -> Result<(), FfiResult> {
    if out.is_null() {
        return Err(FfiResult::NullPointer);
    }
    let owned = CString::new(text).map_err(|_| FfiResult::InvalidArgument)?;
    // SAFETY: `out` was checked for null and points to caller-owned storage.
    unsafe { *out = owned.into_raw() };
    Ok(())
}

fn write_error(out: *mut *mut c_char, message: &str) {
    // Errors are best-effort; interior NULs are dropped rather than losing the message.
    let _ = write_string(out, &message.replace('\0', ""));
}

extern "C" fn free_ffi_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        // SAFETY: every string handed out by this side came from `CString::into_raw`.
        unsafe { drop(CString::from_raw(ptr)) };
    }
}

extern "C" fn module_class_capabilities(
    instance: *const c_void,
    class: *const c_char,
    out_mask: *mut u32,
) -> FfiResult {
    guard(|| {
        if instance.is_null() || out_mask.is_null() {
            return Err(FfiResult::NullPointer);
        }
        // SAFETY: `instance` was produced by `export_module`.
        let module = unsafe { &*(instance as *const Box<dyn PluginModule>) };
        let name = unsafe { str_from_ptr(class) }?;
        let class = module.class(name).ok_or(FfiResult::NotFound)?;
        unsafe { *out_mask = class.capabilities().bits() };
        Ok(())
    })
}

extern "C" fn module_construct(
    instance: *const c_void,
    class: *const c_char,
    args: *const FfiConstructorArgs,
    out_panel: *mut *mut FfiPanelVTable,
    out_error: *mut *mut c_char,
) -> FfiResult {
    guard(|| {
        if instance.is_null() || args.is_null() || out_panel.is_null() {
            return Err(FfiResult::NullPointer);
        }
        // SAFETY: `instance` was produced by `export_module`; `args` is host-owned for this call.
        let module = unsafe { &*(instance as *const Box<dyn PluginModule>) };
        let args = unsafe { &*args };
        let name = unsafe { str_from_ptr(class) }?;
        let class = module.class(name).ok_or(FfiResult::NotFound)?;

        let config = match unsafe { opt_str_from_ptr(args.config_json) }? {
            Some(json) => match serde_json::from_str::<PluginDescriptor>(json) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    write_error(out_error, &format!("invalid config argument: {}", e));
                    return Err(FfiResult::InvalidArgument);
                }
            },
            None => None,
        };
        let plugin_path = unsafe { opt_str_from_ptr(args.plugin_path) }?.map(PathBuf::from);

        match class.construct(ConstructorArgs { config, plugin_path }) {
            Ok(panel) => {
                // SAFETY: checked for null above.
                unsafe { *out_panel = export_panel(panel) };
                Ok(())
            }
            Err(e) => {
                write_error(out_error, &e.to_string());
                Err(FfiResult::PluginError)
            }
        }
    })
}

extern "C" fn module_destroy(vtable: *mut FfiModuleVTable) {
    if vtable.is_null() {
        return;
    }
    let _ = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: `vtable` and its instance were allocated by `export_module`.
        let vtable = unsafe { Box::from_raw(vtable) };
        if !vtable.instance.is_null() {
            unsafe { drop(Box::from_raw(vtable.instance as *mut Box<dyn PluginModule>)) };
        }
    }));
}

extern "C" fn panel_run(instance: *mut c_void, out_markup: *mut *mut c_char, out_error: *mut *mut c_char) -> FfiResult {
    guard(|| {
        if instance.is_null() {
            return Err(FfiResult::NullPointer);
        }
        // SAFETY: `instance` was produced by `export_panel`.
        let panel = unsafe { &mut *(instance as *mut Box<dyn PanelPlugin>) };
        match panel.run() {
            Ok(unit) => match unit.as_markup() {
                Some(markup) => write_string(out_markup, markup),
                None => {
                    write_error(out_error, "display unit is not markup text");
                    Err(FfiResult::InvalidArgument)
                }
            },
            Err(e) => {
                write_error(out_error, &e.to_string());
                Err(FfiResult::PluginError)
            }
        }
    })
}

extern "C" fn panel_backfill_plugin_path(instance: *mut c_void, path: *const c_char) -> FfiResult {
    guard(|| {
        if instance.is_null() {
            return Err(FfiResult::NullPointer);
        }
        // SAFETY: `instance` was produced by `export_panel`.
        let panel = unsafe { &mut *(instance as *mut Box<dyn PanelPlugin>) };
        let dir = unsafe { str_from_ptr(path) }?;
        if panel.backfill_plugin_path(Path::new(dir)) {
            Ok(())
        } else {
            Err(FfiResult::NotFound)
        }
    })
}

extern "C" fn panel_destroy(vtable: *mut FfiPanelVTable) {
    if vtable.is_null() {
        return;
    }
    let _ = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: `vtable` and its instance were allocated by `export_panel`.
        let vtable = unsafe { Box::from_raw(vtable) };
        if !vtable.instance.is_null() {
            unsafe { drop(Box::from_raw(vtable.instance as *mut Box<dyn PanelPlugin>)) };
        }
    }));
}

// --- Host side ---

/// Take ownership of a module-allocated string and release it through `free`.
///
/// # Safety
/// `ptr` must be null or a string allocated by the module that provided `free`.
unsafe fn take_string(ptr: *mut c_char, free: extern "C" fn(*mut c_char)) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let text = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
    free(ptr);
    Some(text)
}

fn ffi_error(module: &str, operation: &str, message: impl Into<String>) -> PluginSystemError {
    PluginSystemError::FfiError {
        module: module.to_string(),
        operation: operation.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Clone, Copy)]
struct ModuleVTablePtr(*mut FfiModuleVTable);
unsafe impl Send for ModuleVTablePtr {}
unsafe impl Sync for ModuleVTablePtr {}

#[derive(Debug, Clone, Copy)]
struct PanelVTablePtr(*mut FfiPanelVTable);
unsafe impl Send for PanelVTablePtr {}

/// Owns a module vtable; the library (if any) outlives the vtable.
struct ModuleHandle {
    vtable: ModuleVTablePtr,
    name: String,
    _library: Option<Arc<Library>>,
}

impl ModuleHandle {
    fn vtable(&self) -> &FfiModuleVTable {
        // SAFETY: non-null checked at construction, valid until `drop`.
        unsafe { &*self.vtable.0 }
    }
}

impl Drop for ModuleHandle {
    fn drop(&mut self) {
        let destroy = self.vtable().destroy;
        debug!("Destroying native module '{}'", self.name);
        destroy(self.vtable.0);
    }
}

/// A module reached through an [`FfiModuleVTable`].
#[derive(Clone)]
pub struct NativeModule {
    handle: Arc<ModuleHandle>,
}

impl NativeModule {
    /// Wrap a vtable obtained from a module's init function.
    ///
    /// # Safety
    /// `vtable` must have been produced by [`export_module`] (or an ABI-compatible
    /// exporter) and not yet destroyed. `library`, when given, must be the
    /// library the vtable's functions live in.
    pub unsafe fn from_raw(
        vtable: *mut FfiModuleVTable,
        name: impl Into<String>,
        library: Option<Arc<Library>>,
    ) -> Result<Self, PluginSystemError> {
        let name = name.into();
        if vtable.is_null() {
            return Err(ffi_error(&name, "init", "module init returned a null vtable"));
        }
        Ok(Self {
            handle: Arc::new(ModuleHandle {
                vtable: ModuleVTablePtr(vtable),
                name,
                _library: library,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.handle.name
    }
}

impl PluginModule for NativeModule {
    fn class(&self, name: &str) -> Option<Arc<dyn PluginClass>> {
        let c_name = CString::new(name).ok()?;
        let vtable = self.handle.vtable();
        let mut mask = 0u32;
        match (vtable.class_capabilities)(vtable.instance, c_name.as_ptr(), &mut mask) {
            FfiResult::Ok => Some(Arc::new(NativeClass {
                handle: Arc::clone(&self.handle),
                name: c_name,
                declared_bits: mask,
            })),
            FfiResult::NotFound => None,
            other => {
                error!("Module '{}' failed to describe class '{}': {:?}", self.handle.name, name, other);
                None
            }
        }
    }
}

struct NativeClass {
    handle: Arc<ModuleHandle>,
    name: CString,
    declared_bits: u32,
}

impl NativeClass {
    fn class_name(&self) -> String {
        self.name.to_string_lossy().into_owned()
    }
}

impl PluginClass for NativeClass {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::from_bits(self.declared_bits & CapabilitySet::KNOWN_BITS).unwrap_or_default()
    }

    fn construct(&self, args: ConstructorArgs) -> Result<Box<dyn PanelPlugin>, PluginError> {
        if let Err(unknown) = CapabilitySet::from_bits(self.declared_bits) {
            return Err(PluginError::Construction(format!(
                "class '{}' declares unknown capabilities {:#b}",
                self.class_name(),
                unknown
            )));
        }

        let config_json = args
            .config
            .map(|descriptor| {
                serde_json::to_string(&descriptor)
                    .map_err(|e| PluginError::Construction(format!("failed to encode config: {}", e)))
                    .and_then(|json| {
                        CString::new(json).map_err(|_| PluginError::Construction("config contains NUL".to_string()))
                    })
            })
            .transpose()?;
        let plugin_path = args
            .plugin_path
            .map(|path| path_to_cstring(&path))
            .transpose()?;

        let ffi_args = FfiConstructorArgs {
            config_json: config_json.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            plugin_path: plugin_path.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
        };

        let vtable = self.handle.vtable();
        let mut panel: *mut FfiPanelVTable = ptr::null_mut();
        let mut error: *mut c_char = ptr::null_mut();
        let result = (vtable.construct)(vtable.instance, self.name.as_ptr(), &ffi_args, &mut panel, &mut error);
        // SAFETY: `error` is null or was allocated by this module.
        let message = unsafe { take_string(error, vtable.free_string) };

        match result {
            FfiResult::Ok if !panel.is_null() => Ok(Box::new(NativePanel {
                vtable: PanelVTablePtr(panel),
                _module: Arc::clone(&self.handle),
            })),
            FfiResult::Ok => Err(PluginError::Construction("module returned a null instance".to_string())),
            other => Err(PluginError::Construction(
                message.unwrap_or_else(|| format!("module returned {:?}", other)),
            )),
        }
    }
}

fn path_to_cstring(path: &Path) -> Result<CString, PluginError> {
    let text = path
        .to_str()
        .ok_or_else(|| PluginError::Construction(format!("path '{}' is not valid UTF-8", path.display())))?;
    CString::new(text).map_err(|_| PluginError::Construction("path contains NUL".to_string()))
}

/// A live instance behind an [`FfiPanelVTable`]. Keeps its module loaded.
struct NativePanel {
    vtable: PanelVTablePtr,
    _module: Arc<ModuleHandle>,
}

impl NativePanel {
    fn vtable(&self) -> &FfiPanelVTable {
        // SAFETY: non-null checked at construction, valid until `drop`.
        unsafe { &*self.vtable.0 }
    }
}

impl PanelPlugin for NativePanel {
    fn run(&mut self) -> Result<DisplayUnit, PluginError> {
        let vtable = self.vtable();
        let mut markup: *mut c_char = ptr::null_mut();
        let mut error: *mut c_char = ptr::null_mut();
        let result = (vtable.run)(vtable.instance, &mut markup, &mut error);
        // SAFETY: both pointers are null or were allocated by the module.
        let markup = unsafe { take_string(markup, vtable.free_string) };
        let message = unsafe { take_string(error, vtable.free_string) };

        match (result, markup) {
            (FfiResult::Ok, Some(markup)) => Ok(DisplayUnit::markup(markup)),
            (FfiResult::Ok, None) => Err(PluginError::Run("module returned no display unit".to_string())),
            (other, _) => Err(PluginError::Run(message.unwrap_or_else(|| format!("module returned {:?}", other)))),
        }
    }

    fn backfill_plugin_path(&mut self, dir: &Path) -> bool {
        let Ok(c_dir) = path_to_cstring(dir) else {
            warn!("Cannot pass plugin path '{}' to native module", dir.display());
            return false;
        };
        let vtable = self.vtable();
        (vtable.backfill_plugin_path)(vtable.instance, c_dir.as_ptr()) == FfiResult::Ok
    }
}

impl Drop for NativePanel {
    fn drop(&mut self) {
        let destroy = self.vtable().destroy;
        destroy(self.vtable.0);
    }
}

/// Loads module libraries with `libloading`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeModuleLoader;

impl NativeModuleLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for NativeModuleLoader {
    fn load_file(&self, path: &Path) -> Result<Arc<dyn PluginModule>, PluginSystemError> {
        let module_name = path.to_string_lossy().into_owned();

        // SAFETY: loading a library runs its initializers; plugin libraries are trusted code.
        let library = unsafe { Library::new(path) }.map_err(|e| PluginSystemError::FfiError {
            module: module_name.clone(),
            operation: "open".to_string(),
            message: PluginSystemErrorSource::Library(e).to_string(),
        })?;
        let library = Arc::new(library);

        let init: ModuleInitFn = {
            let symbol_name = format!("{}\0", MODULE_INIT_SYMBOL);
            // SAFETY: the symbol is declared with the `ModuleInitFn` signature by exporting crates.
            let symbol: Symbol<ModuleInitFn> = unsafe { library.get(symbol_name.as_bytes()) }
                .map_err(|e| ffi_error(&module_name, "lookup", format!("missing symbol {}: {}", MODULE_INIT_SYMBOL, e)))?;
            *symbol
        };

        let vtable = panic::catch_unwind(|| unsafe { init() }).map_err(|payload| {
            ffi_error(&module_name, "init", format!("panic: {}", panic_message(payload.as_ref())))
        })?;

        // SAFETY: `vtable` came from this library's init function and the library is kept alive with it.
        let module = unsafe { NativeModule::from_raw(vtable, module_name, Some(library)) }?;
        debug!("Loaded native module {}", module.name());
        Ok(Arc::new(module))
    }
}
