#![cfg(test)]

use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;

use crate::runtime_env::catalog::{EnvironmentCatalog, ModuleEntry, ModuleType};
use crate::runtime_env::error::RuntimeEnvError;

#[test]
fn test_missing_catalog_is_empty() {
    let tmp = tempdir().unwrap();
    let catalog = EnvironmentCatalog::load(&tmp.path().join("environments.json")).unwrap();
    assert_eq!(catalog, EnvironmentCatalog::new());
}

#[test]
fn test_reads_documented_shape() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("environments.json");
    fs::write(
        &path,
        r#"{
            "base": {"ffmpeg": {"type": "common", "path": "/opt/ffmpeg/bin"}},
            "custom": {
                "science": {
                    "numeric": {"type": "package", "path": "numeric", "version": "1.2", "description": "arrays"},
                    "plain": {"path": "plain"}
                }
            }
        }"#,
    )
    .unwrap();

    let catalog = EnvironmentCatalog::load(&path).unwrap();
    assert_eq!(catalog.base["ffmpeg"].kind, ModuleType::Common);
    let science = catalog.modules("science").unwrap();
    assert_eq!(science["numeric"].version.as_deref(), Some("1.2"));
    assert_eq!(science["numeric"].description.as_deref(), Some("arrays"));
    // type defaults to package
    assert_eq!(science["plain"].kind, ModuleType::Package);
    assert_eq!(catalog.environment_names().collect::<Vec<_>>(), vec!["science"]);
    assert!(catalog.modules("base").is_some());
    assert!(catalog.modules("nope").is_none());
}

#[test]
fn test_save_then_load() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("runtime/environments.json");

    let mut catalog = EnvironmentCatalog::new();
    assert!(catalog.add_environment("media"));
    assert!(catalog.add_module(
        "media",
        "tools",
        ModuleEntry {
            kind: ModuleType::Common,
            path: PathBuf::from("tools"),
            ..ModuleEntry::default()
        }
    ));
    catalog.save(&path).unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("\"type\": \"common\""));
    assert!(!written.contains("version"));
    assert_eq!(EnvironmentCatalog::load(&path).unwrap(), catalog);
}

#[test]
fn test_malformed_catalog_is_an_error() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("environments.json");
    fs::write(&path, r#"{"custom": {"x": {"m": {"type": "binary"}}}}"#).unwrap();
    assert!(matches!(
        EnvironmentCatalog::load(&path),
        Err(RuntimeEnvError::CatalogMalformed { .. })
    ));
}

#[test]
fn test_catalog_edits() {
    let mut catalog = EnvironmentCatalog::new();
    assert!(catalog.add_environment("a"));
    assert!(!catalog.add_environment("a"));
    assert!(!catalog.add_environment("base"));

    assert!(!catalog.add_module("missing", "m", ModuleEntry::default()));
    assert!(catalog.add_module("base", "core", ModuleEntry::default()));
    assert!(catalog.add_module("a", "m", ModuleEntry::default()));

    assert!(catalog.remove_module("base", "core").is_some());
    assert!(catalog.remove_module("a", "m").is_some());
    assert!(catalog.remove_module("a", "m").is_none());
    assert!(catalog.remove_module("missing", "m").is_none());
    assert!(catalog.remove_environment("a").is_some());
    assert_eq!(catalog.environment_names().count(), 0);
}
