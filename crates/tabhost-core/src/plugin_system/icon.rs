//! Icon lookup for plugins.
//!
//! Two independent policies live here. [`resolve_vector_icon`] picks an
//! `icon.<ext>` file from the plugin directory, rasterizing vector formats
//! the host cannot draw directly. [`display_icon`] decides which icon a tab
//! shows once the plugin is activated.
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, error, warn};

use crate::kernel::constants::{CONVENTIONAL_ICON, RESOURCE_PREFIX};
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::error::PluginSystemError;

/// Candidate extensions in priority order
pub const ICON_EXTENSIONS: [&str; 3] = ["eps", "emf", "svg"];

/// A resolved navigation icon.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Icon {
    #[default]
    Empty,
    /// Vector file the host can load as-is
    Svg(PathBuf),
    /// PNG bytes produced by rasterization
    Raster(Vec<u8>),
}

impl Icon {
    pub fn is_empty(&self) -> bool {
        matches!(self, Icon::Empty)
    }
}

/// Converts a vector image into PNG bytes.
pub trait Rasterizer {
    fn rasterize(&self, source: &Path) -> Result<Vec<u8>, PluginSystemError>;
}

/// Rasterizes through an external Ghostscript process.
#[derive(Debug, Clone)]
pub struct GhostscriptRasterizer {
    program: PathBuf,
    resolution: u32,
}

impl Default for GhostscriptRasterizer {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gs"),
            resolution: 300,
        }
    }
}

impl GhostscriptRasterizer {
    pub fn new(program: impl Into<PathBuf>, resolution: u32) -> Self {
        Self {
            program: program.into(),
            resolution,
        }
    }
}

impl Rasterizer for GhostscriptRasterizer {
    fn rasterize(&self, source: &Path) -> Result<Vec<u8>, PluginSystemError> {
        let failure = |message: String| PluginSystemError::IconResolution {
            path: source.to_path_buf(),
            message,
        };

        let output_file = tempfile::Builder::new()
            .prefix("tabhost-icon-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| failure(format!("cannot create temporary file: {}", e)))?;

        let output = Command::new(&self.program)
            .arg("-dSAFER")
            .arg("-dBATCH")
            .arg("-dNOPAUSE")
            .arg("-sDEVICE=png16m")
            .arg(format!("-sOutputFile={}", output_file.path().display()))
            .arg(format!("-r{}", self.resolution))
            .arg(source)
            .output()
            .map_err(|e| failure(format!("cannot run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            return Err(failure(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let bytes = std::fs::read(output_file.path()).map_err(|e| failure(format!("cannot read raster output: {}", e)))?;
        output_file
            .close()
            .map_err(|e| failure(format!("cannot remove raster output: {}", e)))?;
        if bytes.is_empty() {
            return Err(failure("rasterizer produced no output".to_string()));
        }
        Ok(bytes)
    }
}

/// Find the `icon.*` file whose extension ranks first in [`ICON_EXTENSIONS`].
///
/// Extensions match case-insensitively, so `icon.SVG` counts as svg. When two
/// files share a rank the one with the smaller name wins.
fn find_icon_candidate(dir: &Path) -> Option<(usize, PathBuf)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {} for icons: {}", dir.display(), e);
            return None;
        }
    };

    let mut candidates: Vec<(usize, PathBuf)> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.file_stem().is_some_and(|stem| stem == "icon"))
        .filter_map(|path| {
            let ext = path.extension()?.to_str()?.to_ascii_lowercase();
            let rank = ICON_EXTENSIONS.iter().position(|known| *known == ext)?;
            Some((rank, path))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Pick the plugin directory's `icon.<ext>` file; the best-ranked extension wins.
///
/// Never fails: a conversion error is logged and yields [`Icon::Empty`].
pub fn resolve_vector_icon(dir: &Path, rasterizer: &dyn Rasterizer) -> Icon {
    let Some((rank, candidate)) = find_icon_candidate(dir) else {
        return Icon::Empty;
    };
    debug!("Using icon {}", candidate.display());
    if ICON_EXTENSIONS[rank] == "svg" {
        return Icon::Svg(candidate);
    }
    match rasterizer.rasterize(&candidate) {
        Ok(bytes) => Icon::Raster(bytes),
        Err(e) => {
            error!("{}", e);
            Icon::Empty
        }
    }
}

/// The icon shown for an activated plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    File(PathBuf),
    /// Host-bundled resource reference, passed through untouched
    Resource(String),
    Default,
}

/// Conventional icon file, then the declared icon reference, then the default.
pub fn display_icon(descriptor: &PluginDescriptor) -> IconSource {
    let conventional = descriptor.directory().join(CONVENTIONAL_ICON);
    if conventional.is_file() {
        return IconSource::File(conventional);
    }

    let declared = descriptor.placement.icon_ref.trim();
    if declared.is_empty() {
        return IconSource::Default;
    }
    if declared.starts_with(RESOURCE_PREFIX) {
        return IconSource::Resource(declared.to_string());
    }

    let path = descriptor.directory().join(declared);
    if path.is_file() {
        IconSource::File(path)
    } else {
        warn!(
            "Icon '{}' of plugin '{}' not found, using default",
            path.display(),
            descriptor.name()
        );
        IconSource::Default
    }
}
