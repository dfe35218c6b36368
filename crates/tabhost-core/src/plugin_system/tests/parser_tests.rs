#![cfg(test)]

use std::fs;
use std::path::Path;

use serde_json::json;
use tempfile::tempdir;

use crate::plugin_system::config_parser::{
    RawConfig, StructuredConfig, parse_plugin_dir, parse_sections, parse_structured,
};
use crate::plugin_system::error::PluginSystemError;

const VALID_INI: &str = "\
[metadata]
Name = Clock
version = 2.0

[placement]
path = Tools
priority = 3

[runtime]
type = pyplug
entry_point = clock.so:Clock
";

#[test]
fn test_structured_single_record() {
    let parsed = parse_structured(r#"{"name": "Clock", "entry_point": "clock:Clock"}"#, Path::new("settings.json"))
        .expect("should parse");
    match parsed {
        StructuredConfig::Single(value) => {
            assert_eq!(value["name"], json!("Clock"));
            assert_eq!(value["entry_point"], json!("clock:Clock"));
        }
        other => panic!("Expected single record, got {:?}", other),
    }
}

#[test]
fn test_structured_multi_record_defaults_group_name() {
    let content = r#"{
        "description": "bundle",
        "plugins": [
            {"name": "A", "entry_point": "a:A"},
            {"name": "B", "entry_point": "b:B"}
        ]
    }"#;
    let parsed = parse_structured(content, Path::new("settings.json")).expect("should parse");
    match parsed {
        StructuredConfig::Multi { group, entries } => {
            assert_eq!(group.name, "Unknown");
            assert_eq!(group.description, "bundle");
            assert_eq!(group.shared_resources, json!({}));
            assert_eq!(entries.len(), 2);
        }
        other => panic!("Expected multi record, got {:?}", other),
    }
}

#[test]
fn test_structured_multi_record_keeps_group_info() {
    let content = r#"{
        "plugin_group": "Office",
        "shared_resources": {"theme": "dark"},
        "plugins": [{"name": "A", "entry_point": "a:A"}]
    }"#;
    let parsed = parse_structured(content, Path::new("settings.json")).expect("should parse");
    let StructuredConfig::Multi { group, .. } = parsed else {
        panic!("Expected multi record");
    };
    assert_eq!(group.name, "Office");
    assert_eq!(group.shared_resources, json!({"theme": "dark"}));
}

#[test]
fn test_structured_rejects_non_object() {
    let err = parse_structured("[1, 2, 3]", Path::new("settings.json")).unwrap_err();
    assert!(matches!(err, PluginSystemError::ConfigMalformed { .. }));
}

#[test]
fn test_structured_rejects_syntax_error() {
    let err = parse_structured("{ not json", Path::new("settings.json")).unwrap_err();
    match err {
        PluginSystemError::ConfigMalformed { source, .. } => assert!(source.is_some()),
        other => panic!("Expected ConfigMalformed, got {:?}", other),
    }
}

#[test]
fn test_sections_lowercases_keys() {
    let parsed = parse_sections(VALID_INI, Path::new("settings.ini")).expect("should parse");
    assert_eq!(parsed.metadata.get("name").map(String::as_str), Some("Clock"));
    assert_eq!(parsed.metadata.get("version").map(String::as_str), Some("2.0"));
    assert_eq!(parsed.placement.get("priority").map(String::as_str), Some("3"));
    assert_eq!(parsed.runtime.get("entry_point").map(String::as_str), Some("clock.so:Clock"));
}

#[test]
fn test_sections_missing_section_is_malformed() {
    for missing in ["metadata", "placement", "runtime"] {
        let content: String = VALID_INI
            .split("\n\n")
            .filter(|block| !block.starts_with(&format!("[{}]", missing)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let err = parse_sections(&content, Path::new("settings.ini")).unwrap_err();
        match err {
            PluginSystemError::ConfigMalformed { message, .. } => {
                assert!(message.contains(missing), "message '{}' should name [{}]", message, missing)
            }
            other => panic!("Expected ConfigMalformed, got {:?}", other),
        }
    }
}

#[test]
fn test_sections_empty_value_is_kept() {
    let content = "[metadata]\nname = X\n[placement]\npath =\n[runtime]\nentry_point = x:X\n";
    let parsed = parse_sections(content, Path::new("settings.ini")).expect("should parse");
    assert_eq!(parsed.placement.get("path").map(String::as_str), Some(""));
}

#[tokio::test]
async fn test_dir_without_config_is_missing() {
    let tmp = tempdir().expect("tempdir");
    let err = parse_plugin_dir(tmp.path()).await.unwrap_err();
    assert!(matches!(err, PluginSystemError::ConfigMissing { .. }));
}

#[tokio::test]
async fn test_structured_file_takes_precedence() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("settings.json"), r#"{"name": "J", "entry_point": "j:J"}"#).unwrap();
    fs::write(tmp.path().join("settings.ini"), VALID_INI).unwrap();

    let raw = parse_plugin_dir(tmp.path()).await.expect("should parse");
    assert!(matches!(raw, RawConfig::Structured(_)));
}

#[tokio::test]
async fn test_broken_structured_file_falls_back_to_sections() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("settings.json"), "{ broken").unwrap();
    fs::write(tmp.path().join("settings.ini"), VALID_INI).unwrap();

    let raw = parse_plugin_dir(tmp.path()).await.expect("should fall back");
    assert!(matches!(raw, RawConfig::Sections(_)));
}

#[tokio::test]
async fn test_only_broken_file_is_malformed() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("settings.json"), "{ broken").unwrap();

    let err = parse_plugin_dir(tmp.path()).await.unwrap_err();
    assert!(matches!(err, PluginSystemError::ConfigMalformed { .. }));
}

#[tokio::test]
async fn test_empty_structured_record_falls_back_to_sections() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("settings.json"), "{}").unwrap();
    fs::write(tmp.path().join("settings.ini"), VALID_INI).unwrap();

    let raw = parse_plugin_dir(tmp.path()).await.expect("should fall back");
    assert!(matches!(raw, RawConfig::Sections(_)));
}

#[tokio::test]
async fn test_only_empty_structured_record_is_missing() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("settings.json"), " {} ").unwrap();

    let err = parse_plugin_dir(tmp.path()).await.unwrap_err();
    assert!(matches!(err, PluginSystemError::ConfigMissing { .. }));
}

#[test]
fn test_empty_group_is_not_an_empty_record() {
    let parsed = parse_structured(r#"{"plugins": []}"#, Path::new("settings.json")).unwrap();
    assert!(!parsed.is_empty());
    assert!(parse_structured("{}", Path::new("settings.json")).unwrap().is_empty());
}
