//! Integration tests for the larder CLI

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Run the larder binary against a collection root.
fn larder(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_larder"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .unwrap()
}

fn seed_manifest(root: &Path, key: u64, artifacts: &[(&str, &str)]) {
    let dir = root.join("releases");
    fs::create_dir_all(&dir).unwrap();
    let mut yaml = String::from("apiVersion: larder/v1\n");
    yaml.push_str(&format!("created: \"2026-08-0{key}T10:00:00+00:00\"\n"));
    yaml.push_str("artifacts:\n");
    for (name, version) in artifacts {
        yaml.push_str(&format!("  - name: {name}\n    version: \"{version}\"\n"));
    }
    fs::write(dir.join(format!("{key}.yaml")), yaml).unwrap();
}

fn seed_artifact(root: &Path, name: &str, version: &str) {
    let dir = root.join("artifacts").join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(version), format!("seeded {name} {version}")).unwrap();
}

/// Three releases with their artifacts and a latest pointer.
fn seed_existing(root: &Path) {
    for key in 1..=3u64 {
        let version = format!("0.0.{key}");
        seed_artifact(root, "a", &version);
        seed_artifact(root, "b", &version);
        seed_manifest(root, key, &[("a", &version), ("b", &version)]);
    }
    fs::write(root.join("latest"), "releases/3.yaml").unwrap();
}

#[test]
fn test_releases_lists_newest_first() {
    let dir = TempDir::new().unwrap();
    seed_existing(dir.path());

    let output = larder(dir.path(), &["releases"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("2026-08-03"));
    assert!(lines[2].contains("2026-08-01"));
    assert!(lines[0].contains("2 artifacts"));
}

#[test]
fn test_releases_json_output() {
    let dir = TempDir::new().unwrap();
    seed_existing(dir.path());

    let output = larder(dir.path(), &["releases", "--json"]);
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let releases = parsed.as_array().unwrap();
    assert_eq!(releases.len(), 3);
    assert_eq!(releases[0]["sequence"], 3);
    assert_eq!(releases[0]["artifacts"][0]["name"], "a");
    assert_eq!(releases[0]["artifacts"][0]["version"], "0.0.3");
}

#[test]
fn test_orphans_reports_unreferenced_artifacts() {
    let dir = TempDir::new().unwrap();
    seed_existing(dir.path());
    seed_artifact(dir.path(), "c", "0.9.9");

    let output = larder(dir.path(), &["orphans"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("c 0.9.9"));

    let output = larder(dir.path(), &["orphans", "--json"]);
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let orphans = parsed.as_array().unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0]["name"], "c");
}

#[test]
fn test_latest_shows_current_release() {
    let dir = TempDir::new().unwrap();
    seed_existing(dir.path());

    let output = larder(dir.path(), &["latest"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("2026-08-03"));

    let output = larder(dir.path(), &["latest", "--json"]);
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["sequence"], 3);
}

#[test]
fn test_empty_root_reports_no_releases() {
    let dir = TempDir::new().unwrap();

    let output = larder(dir.path(), &["releases"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No releases."));

    let output = larder(dir.path(), &["latest"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No current release."));
}

#[test]
fn test_corrupt_manifest_fails_with_nonzero_exit() {
    let dir = TempDir::new().unwrap();
    seed_existing(dir.path());
    fs::write(dir.path().join("releases").join("9.yaml"), "{{{ not yaml").unwrap();

    let output = larder(dir.path(), &["releases"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Corrupt release manifest"), "stderr: {stderr}");
}

#[test]
fn test_add_requires_specs() {
    let dir = TempDir::new().unwrap();

    let output = larder(dir.path(), &["add"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No artifact specs"), "stderr: {stderr}");
}

#[test]
fn test_add_rejects_malformed_spec() {
    let dir = TempDir::new().unwrap();

    let output = larder(dir.path(), &["add", "not-a-spec"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NAME@VERSION=URL"), "stderr: {stderr}");
}

#[test]
fn test_add_publishes_release_from_present_artifacts() {
    let dir = TempDir::new().unwrap();
    // content already in the store, so no fetch happens and no server is needed
    seed_artifact(dir.path(), "a", "0.0.4");

    let output = larder(
        dir.path(),
        &["add", "a@0.0.4=https://artifacts.example.com/a-0.0.4.tar.gz"],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Published release 1 (1 artifacts)"), "stdout: {stdout}");
    assert!(dir.path().join("releases").join("1.yaml").exists());

    let output = larder(dir.path(), &["latest", "--json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["sequence"], 1);
    assert_eq!(parsed["artifacts"][0]["name"], "a");
    assert_eq!(parsed["artifacts"][0]["version"], "0.0.4");
}

#[test]
fn test_config_file_supplies_the_root() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("collection");
    seed_existing(&root);
    let config = dir.path().join("larder.yaml");
    fs::write(&config, format!("root: {}\n", root.display())).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_larder"))
        .arg("--config")
        .arg(&config)
        .arg("releases")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 3);
}
