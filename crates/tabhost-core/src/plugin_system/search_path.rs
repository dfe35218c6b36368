//! Process-wide module search path.
//!
//! Package-style plugins and activated runtime environments prepend
//! directories here; the poly load strategy resolves dotted module names
//! against it in order. Entries are deduplicated on insert and are never
//! removed implicitly: an entry added for a plugin stays for the lifetime of
//! the process.
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use log::debug;

/// Shared handle to an ordered list of module directories.
///
/// Clones share the same underlying list.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    entries: Arc<Mutex<Vec<PathBuf>>>,
}

static GLOBAL_SEARCH_PATH: OnceLock<SearchPath> = OnceLock::new();

impl SearchPath {
    /// A fresh, empty search path (tests and embedded hosts).
    pub fn new() -> Self {
        Self::default()
    }

    /// The search path shared by the whole process.
    pub fn global() -> SearchPath {
        GLOBAL_SEARCH_PATH.get_or_init(SearchPath::new).clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PathBuf>> {
        // A poisoned lock only means a panic happened mid-insert; the list is still usable.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert `dir` at the front unless already present. Returns `true` if inserted.
    pub fn insert_front(&self, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        let mut entries = self.lock();
        if entries.iter().any(|e| e == dir) {
            return false;
        }
        debug!("Adding {} to module search path", dir.display());
        entries.insert(0, dir.to_path_buf());
        true
    }

    /// Remove `dir`. Returns `true` if it was present.
    pub fn remove(&self, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| e != dir);
        before != entries.len()
    }

    pub fn contains(&self, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        self.lock().iter().any(|e| e == dir)
    }

    /// Snapshot of the entries in lookup order
    pub fn entries(&self) -> Vec<PathBuf> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// The OS executable search list (`PATH`), modelled as an ordered list.
///
/// Changes stay in memory until [`ExecutablePath::apply_to_process`] writes
/// them back to the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutablePath {
    entries: Vec<PathBuf>,
}

impl ExecutablePath {
    pub fn new(entries: Vec<PathBuf>) -> Self {
        Self { entries }
    }

    /// Read the current process `PATH`.
    pub fn from_env() -> Self {
        let entries = std::env::var_os("PATH")
            .map(|raw| std::env::split_paths(&raw).collect())
            .unwrap_or_default();
        Self { entries }
    }

    /// Insert `dir` at the front unless already present. Returns `true` if inserted.
    pub fn insert_front(&mut self, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        if self.contains(dir) {
            return false;
        }
        self.entries.insert(0, dir.to_path_buf());
        true
    }

    pub fn remove(&mut self, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        let before = self.entries.len();
        self.entries.retain(|e| e != dir);
        before != self.entries.len()
    }

    pub fn contains(&self, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        self.entries.iter().any(|e| e == dir)
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Write the list back to the process `PATH`.
    ///
    /// Must only be called while no other thread reads or writes the
    /// environment, i.e. from the single interaction thread.
    pub fn apply_to_process(&self) -> Result<(), std::env::JoinPathsError> {
        let joined = std::env::join_paths(&self.entries)?;
        // SAFETY: the host mutates the environment only from its single
        // interaction thread, before or between plugin activations.
        unsafe { std::env::set_var("PATH", joined) };
        Ok(())
    }
}
