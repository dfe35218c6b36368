use std::fs;
use std::path::Path;

use assert_cmd::Command; // Bring Command into scope
use predicates::prelude::*; // Bring predicate traits into scope
use tempfile::{TempDir, tempdir};

/// Workspace with a plugins tree: two valid plugins and one broken directory.
fn workspace() -> TempDir {
    let tmp = tempdir().unwrap();
    let plugins = tmp.path().join("plugins");

    write(
        &plugins.join("clock/settings.json"),
        r#"{"name": "Clock", "version": "2.1", "entry_point": "libclock.so:Clock", "placement": {"path": "Tools", "priority": 5}}"#,
    );
    write(
        &plugins.join("notes/settings.ini"),
        "[metadata]\nname = Notes\n\n[placement]\npath = \npriority = 1\n\n[runtime]\ntype = pyplug\nentry_point = notes.so:Notes\n",
    );
    write(&plugins.join("broken/settings.ini"), "[metadata]\nname = Broken\n");
    tmp
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn tabhost(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tabhost").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG").env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_ping_command() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("tabhost")?;
    cmd.arg("--ping");
    cmd.assert().success().stdout(predicate::str::contains("pong"));
    Ok(())
}

#[test]
fn test_plugin_list_is_priority_ordered() {
    let tmp = workspace();
    let output = tabhost(tmp.path()).args(["plugin", "list"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();

    let notes = stdout.find("Notes").expect("Notes listed");
    let clock = stdout.find("Clock").expect("Clock listed");
    assert!(notes < clock);
    assert!(stdout.contains("2.1"));
    assert!(!stdout.contains("Broken"));
}

#[test]
fn test_plugin_list_with_missing_root() {
    let tmp = tempdir().unwrap();
    tabhost(tmp.path())
        .args(["--plugins-dir", "nowhere", "plugin", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No plugins found"));
}

#[test]
fn test_plugin_tree_places_key_value_plugins_under_root() {
    let tmp = workspace();
    tabhost(tmp.path())
        .args(["plugin", "tree"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Plugins/\n"))
        .stdout(predicate::str::contains("  Tools/\n    - Clock\n"))
        .stdout(predicate::str::contains("  - Notes\n"));
}

#[test]
fn test_plugin_tree_icons() {
    let tmp = workspace();
    fs::write(tmp.path().join("plugins/clock/icon.svg"), "<svg/>").unwrap();
    tabhost(tmp.path())
        .args(["plugin", "tree", "--icons"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Icons:"))
        .stdout(predicate::str::contains("Notes: none"))
        .stdout(predicate::str::contains("icon.svg"));
}

#[test]
fn test_activation_failure_is_reported_per_plugin() {
    let tmp = workspace();
    tabhost(tmp.path())
        .args(["--runtime-dir", "runtime", "plugin", "activate", "Clock", "Notes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("failed to load plugin 'Notes'"))
        .stdout(predicate::str::contains("failed to load plugin 'Clock'"));
    assert!(tmp.path().join("runtime/base").is_dir());
}

#[test]
fn test_activating_unknown_plugin_fails() {
    let tmp = workspace();
    tabhost(tmp.path())
        .args(["plugin", "activate", "Ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No plugin named 'Ghost'"));
}

#[test]
fn test_default_session_activates_everything() {
    let tmp = workspace();
    tabhost(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Plugins/"))
        .stdout(predicate::str::contains("0 plugin(s) activated, 2 failed"))
        .stdout(predicate::str::contains("pong").not());
}

#[test]
fn test_env_commands() {
    let tmp = tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("runtime/science/numeric")).unwrap();
    write(
        &tmp.path().join("runtime/environments.json"),
        r#"{"base": {}, "custom": {"science": {"numeric": {"type": "package", "path": "numeric"}}}}"#,
    );

    tabhost(tmp.path())
        .args(["env", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("base"))
        .stdout(predicate::str::contains("science"))
        .stdout(predicate::str::contains("1 module(s)"));

    tabhost(tmp.path())
        .args(["env", "activate", "science"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Environment 'science' active: 2 module path(s)"));

    tabhost(tmp.path())
        .args(["env", "activate", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));

    // Each command is a new process; the activation is read back from disk
    tabhost(tmp.path())
        .args(["env", "list"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"science\s+active").unwrap());

    tabhost(tmp.path())
        .args(["env", "deactivate", "science"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Environment 'science' deactivated"));

    tabhost(tmp.path())
        .args(["env", "deactivate", "science"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not active"));
}

#[test]
fn test_env_catalog_editing() {
    let tmp = tempdir().unwrap();
    let catalog = tmp.path().join("runtime/environments.json");

    tabhost(tmp.path())
        .args(["env", "create", "lab"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Environment 'lab' created"));
    assert!(tmp.path().join("runtime/lab").is_dir());

    tabhost(tmp.path())
        .args(["env", "create", "lab"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    tabhost(tmp.path())
        .args(["env", "add-module", "lab", "tools", "bin", "--common", "--module-version", "1.2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Module 'tools' (common) recorded in 'lab'"));
    let saved = fs::read_to_string(&catalog).unwrap();
    assert!(saved.contains("\"common\""));
    assert!(saved.contains("\"1.2\""));

    tabhost(tmp.path())
        .args(["env", "add-module", "ghost", "tools", "bin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No environment named 'ghost'"));

    tabhost(tmp.path())
        .args(["env", "list"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"lab\s+inactive\s+1 module\(s\)").unwrap());

    tabhost(tmp.path())
        .args(["env", "remove-module", "lab", "tools"])
        .assert()
        .success();
    tabhost(tmp.path())
        .args(["env", "delete", "lab"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Environment 'lab' removed (0 module(s))"));
    assert!(!fs::read_to_string(&catalog).unwrap().contains("lab"));
    assert!(tmp.path().join("runtime/lab").is_dir());
}

#[test]
fn test_broken_environment_catalog_does_not_stop_plugins() {
    let tmp = workspace();
    write(&tmp.path().join("runtime/environments.json"), "{");

    tabhost(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0 plugin(s) activated, 2 failed"))
        .stderr(predicate::str::contains("Malformed environment catalog"));

    tabhost(tmp.path())
        .args(["plugin", "activate", "Clock", "--env", "science"])
        .assert()
        .success()
        .stdout(predicate::str::contains("failed to load plugin 'Clock'"));
}

#[test]
fn test_log_records_keep_their_module_target() {
    let tmp = workspace();
    tabhost(tmp.path())
        .args(["--log-level", "debug", "plugin", "list"])
        .assert()
        .success()
        .stderr(predicate::str::contains("tabhost_core::plugin_system"))
        .stderr(predicate::str::contains("log.target").not());
}

#[test]
fn test_malformed_config_is_fatal() {
    let tmp = tempdir().unwrap();
    write(&tmp.path().join("config/settings.toml"), "plugins_dir = [");
    tabhost(tmp.path())
        .args(["plugin", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
