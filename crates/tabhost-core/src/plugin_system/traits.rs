use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::plugin_system::descriptor::PluginDescriptor;

/// Named values the activator can hand to a plugin constructor.
///
/// A class receives exactly the capabilities it declares and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The full plugin descriptor.
    Config,
    /// The plugin's directory.
    PluginPath,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Config, Capability::PluginPath];

    /// Parameter name the capability is offered under
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Config => "config",
            Capability::PluginPath => "plugin_path",
        }
    }

    /// Parse a declared parameter name
    pub fn from_name(name: &str) -> Option<Self> {
        Capability::ALL.into_iter().find(|c| c.name() == name)
    }

    pub(crate) fn bit(&self) -> u32 {
        match self {
            Capability::Config => 1 << 0,
            Capability::PluginPath => 1 << 1,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of capabilities a class declares for its constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u32);

impl CapabilitySet {
    pub const KNOWN_BITS: u32 = 0b11;

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0 |= capability.bit();
        self
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Rebuild a set from raw bits; bits naming no known capability are returned as the error.
    pub fn from_bits(bits: u32) -> Result<Self, u32> {
        let unknown = bits & !Self::KNOWN_BITS;
        if unknown != 0 {
            return Err(unknown);
        }
        Ok(Self(bits))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(CapabilitySet::empty(), CapabilitySet::with)
    }
}

/// Arguments supplied to a constructor; only declared capabilities are `Some`.
#[derive(Debug, Clone, Default)]
pub struct ConstructorArgs {
    pub config: Option<PluginDescriptor>,
    pub plugin_path: Option<PathBuf>,
}

impl ConstructorArgs {
    /// Build the argument set for `declared`, drawing values from `descriptor`.
    pub fn negotiate(declared: CapabilitySet, descriptor: &PluginDescriptor) -> Self {
        let mut args = ConstructorArgs::default();
        for capability in declared.iter() {
            match capability {
                Capability::Config => args.config = Some(descriptor.clone()),
                Capability::PluginPath => args.plugin_path = Some(descriptor.directory.clone()),
            }
        }
        args
    }
}

/// Opaque renderable handle returned by a plugin's `run`.
///
/// The core never interprets the contents; the host downcasts to whatever its
/// rendering layer understands. Native modules hand over markup text.
pub struct DisplayUnit {
    content: Box<dyn Any + Send>,
}

impl DisplayUnit {
    pub fn new<T: Any + Send>(content: T) -> Self {
        Self {
            content: Box::new(content),
        }
    }

    /// A unit carrying markup text
    pub fn markup(text: impl Into<String>) -> Self {
        Self::new(text.into())
    }

    pub fn as_markup(&self) -> Option<&str> {
        self.content.downcast_ref::<String>().map(String::as_str)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.content.downcast_ref::<T>()
    }

    pub fn into_inner(self) -> Box<dyn Any + Send> {
        self.content
    }
}

impl fmt::Debug for DisplayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_markup() {
            Some(text) => f.debug_tuple("DisplayUnit").field(&text).finish(),
            None => f.write_str("DisplayUnit(<opaque>)"),
        }
    }
}

/// Error type for plugin-side operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin construction error: {0}")]
    Construction(String),
    #[error("Plugin execution error: {0}")]
    Run(String),
    #[error("Missing constructor argument: {0}")]
    MissingArgument(&'static str),
}

/// A live plugin instance hosted in a tab.
pub trait PanelPlugin: Send {
    /// Produce the displayable unit for the host to embed.
    fn run(&mut self) -> Result<DisplayUnit, PluginError>;

    /// Mutable directory slot for instances that record where they live.
    ///
    /// Instances returning a slot get it back-filled with the plugin directory
    /// when it is still unset after construction.
    fn plugin_path_slot(&mut self) -> Option<&mut Option<PathBuf>> {
        None
    }

    /// Fill an unset plugin path slot with `dir`. Returns `true` when a value was written.
    fn backfill_plugin_path(&mut self, dir: &Path) -> bool {
        match self.plugin_path_slot() {
            Some(slot) if slot.is_none() => {
                *slot = Some(dir.to_path_buf());
                true
            }
            _ => false,
        }
    }
}

/// A constructible plugin class exported by a module.
pub trait PluginClass: Send + Sync {
    /// The constructor parameters this class wants supplied.
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::empty()
    }

    /// Build an instance from the negotiated arguments.
    fn construct(&self, args: ConstructorArgs) -> Result<Box<dyn PanelPlugin>, PluginError>;
}

/// A loaded code module exporting plugin classes by name.
pub trait PluginModule: Send + Sync {
    fn class(&self, name: &str) -> Option<Arc<dyn PluginClass>>;
}

/// A module backed by an in-memory table of classes.
///
/// Native modules build one of these and export it; in-process hosts can
/// hand one straight to a loader.
#[derive(Clone, Default)]
pub struct ClassTable {
    classes: HashMap<String, Arc<dyn PluginClass>>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `class` under `name`, replacing any previous class of that name.
    pub fn with(mut self, name: &str, class: impl PluginClass + 'static) -> Self {
        self.classes.insert(name.to_string(), Arc::new(class));
        self
    }

    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl PluginModule for ClassTable {
    fn class(&self, name: &str) -> Option<Arc<dyn PluginClass>> {
        self.classes.get(name).cloned()
    }
}
