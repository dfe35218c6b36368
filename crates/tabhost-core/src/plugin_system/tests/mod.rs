pub mod ffi_tests;
pub mod parser_tests;
pub mod search_path_tests;

use std::path::Path;

use crate::plugin_system::descriptor::{
    EntryPoint, Placement, PluginDescriptor, PluginKind, PluginMeta, RuntimeSpec, SourceFormat,
};

/// A minimal descriptor rooted at `dir`.
pub(crate) fn sample_descriptor(dir: &Path, name: &str, kind: PluginKind, entry_point: &str) -> PluginDescriptor {
    PluginDescriptor {
        meta: PluginMeta {
            name: name.to_string(),
            version: "1.0".to_string(),
            author: "Unknown".to_string(),
            description: String::new(),
            category: "General".to_string(),
        },
        placement: Placement {
            path: String::new(),
            priority: 0,
            icon_ref: String::new(),
        },
        runtime: RuntimeSpec {
            kind,
            entry_point: entry_point.parse::<EntryPoint>().expect("valid entry point"),
            dependencies: Vec::new(),
            config: String::new(),
        },
        directory: dir.to_path_buf(),
        source_format: SourceFormat::Structured,
        group: None,
    }
}
