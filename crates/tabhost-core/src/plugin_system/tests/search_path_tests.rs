#![cfg(test)]

use std::path::PathBuf;

use crate::plugin_system::search_path::{ExecutablePath, SearchPath};

#[test]
fn test_insert_front_deduplicates() {
    let path = SearchPath::new();
    assert!(path.insert_front("/a"));
    assert!(path.insert_front("/b"));
    assert!(!path.insert_front("/a"));
    assert_eq!(path.entries(), vec![PathBuf::from("/b"), PathBuf::from("/a")]);
}

#[test]
fn test_clones_share_entries() {
    let path = SearchPath::new();
    let other = path.clone();
    other.insert_front("/shared");
    assert!(path.contains("/shared"));
    assert!(path.remove("/shared"));
    assert!(other.is_empty());
    assert!(!path.remove("/shared"));
}

#[test]
fn test_executable_path_edits() {
    let mut exe = ExecutablePath::new(vec![PathBuf::from("/usr/bin")]);
    assert!(exe.insert_front("/opt/tool/bin"));
    assert!(!exe.insert_front("/usr/bin"));
    assert_eq!(exe.entries()[0], PathBuf::from("/opt/tool/bin"));
    assert!(exe.remove("/opt/tool/bin"));
    assert_eq!(exe.entries(), &[PathBuf::from("/usr/bin")]);
}
