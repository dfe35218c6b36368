//! Scans a discovery root for plugin installations.
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::fs;

use crate::plugin_system::config_parser::parse_plugin_dir;
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::normalizer::normalize;

/// Result of one discovery pass.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Sorted by ascending priority; ties keep directory name order.
    pub descriptors: Vec<PluginDescriptor>,
    /// Directories and entries that yielded no descriptor, already logged.
    pub failures: Vec<PluginSystemError>,
}

/// Discovers plugins under a root whose immediate subdirectories are plugin installations.
///
/// Read-only; every call re-reads the filesystem.
#[derive(Debug, Clone)]
pub struct PluginDiscovery {
    root: PathBuf,
}

impl PluginDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();

        for dir in self.plugin_dirs().await {
            match parse_plugin_dir(&dir).await {
                Ok(raw) => {
                    let batch = normalize(raw, &dir);
                    report.descriptors.extend(batch.descriptors);
                    report.failures.extend(batch.rejected);
                }
                Err(e) => {
                    debug!("Skipping {}: {}", dir.display(), e);
                    report.failures.push(e);
                }
            }
        }

        // Stable: equal priorities keep directory order.
        report.descriptors.sort_by_key(PluginDescriptor::priority);

        info!(
            "Discovered {} plugin(s) in {} ({} skipped)",
            report.descriptors.len(),
            self.root.display(),
            report.failures.len()
        );
        report
    }

    /// Immediate subdirectories, sorted by name.
    async fn plugin_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Plugin directory {} is not readable: {}", self.root.display(), e);
                return dirs;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    // Follows symlinks so linked installations count as directories.
                    match fs::metadata(&path).await {
                        Ok(meta) if meta.is_dir() => dirs.push(path),
                        Ok(_) => {}
                        Err(e) => warn!("Cannot stat {}: {}", path.display(), e),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Error while listing {}: {}", self.root.display(), e);
                    break;
                }
            }
        }

        dirs.sort();
        dirs
    }
}

/// Scan `root` and return the sorted descriptors.
pub async fn scan_plugins(root: impl AsRef<Path>) -> Vec<PluginDescriptor> {
    PluginDiscovery::new(root.as_ref()).scan().await.descriptors
}
