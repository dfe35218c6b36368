//! Small filesystem helpers shared by the runtime environment registry.
pub mod fs;

pub use fs::{contains_native_library, find_files, find_files_with_extension, list_subdirectories};
