use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const MANIFEST: &str = r#"{
    "name": "core",
    "data": "core.bin",
    "assets": [
        {
            "url": "textures/logo.png",
            "type": "Engine.Graphics.Texture2D, Engine",
            "offset": 0,
            "size": 4,
            "image": { "format": "BC1", "width": 64, "height": 32 }
        },
        {
            "url": "data/config.json",
            "type": "Engine.TextAsset, Engine",
            "offset": 4,
            "size": 5
        }
    ]
}"#;

fn bundle() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("core.json");
    fs::write(&manifest, MANIFEST).unwrap();
    fs::write(dir.path().join("core.bin"), b"AAAAhello").unwrap();
    let manifest = manifest.to_string_lossy().to_string();
    (dir, manifest)
}

fn isobridge() -> Command {
    let mut cmd = Command::cargo_bin("isobridge").unwrap();
    cmd.env_remove("ISOBRIDGE_CONFIG").env("ISOBRIDGE_LOG", "off");
    cmd
}

#[test]
fn test_version() {
    isobridge()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "isobridge {}",
            env!("CARGO_PKG_VERSION")
        )))
        .stdout(predicate::str::contains("component: isobridge::exports"));
}

#[test]
fn test_domains_create_and_unload() {
    isobridge()
        .args(["domains", "--count", "3", "--unload"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created domain 1"))
        .stdout(predicate::str::contains("created domain 3"))
        .stdout(predicate::str::contains("live domains: [1, 2, 3]"))
        .stdout(predicate::str::contains("unloaded domain 2: true"))
        .stdout(predicate::str::contains("teardowns completed: 3"));
}

#[test]
fn test_inspect_root() {
    let (_dir, manifest) = bundle();
    isobridge()
        .args(["inspect", "--bundle", &manifest])
        .assert()
        .success()
        .stdout(predicate::str::contains("domain 0: 2 objects"))
        .stdout(predicate::str::contains(
            "textures/logo.png\tEngine.Graphics.Texture2D, Engine\t4",
        ));
}

#[test]
fn test_inspect_isolated_json() {
    let (_dir, manifest) = bundle();
    let output = isobridge()
        .args(["inspect", "--bundle", &manifest, "--isolated", "--json", "--pattern", "data/*"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["url"], "data/config.json");
    assert_eq!(rows[0]["type"], "Engine.TextAsset, Engine");
    assert_eq!(rows[0]["size"], 5);
}

#[test]
fn test_inspect_missing_bundle() {
    isobridge()
        .args(["inspect", "--bundle", "/nonexistent/core.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Bundle not found"));
}
