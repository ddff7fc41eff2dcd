//! End-to-end tests for the `tote` binary.

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn project(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tote.toml"), config).unwrap();
    dir
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

const SIMPLE: &str = r#"
[project]
name = "shop"
version = "1.0.0"

[entry]
app = "src/main.js"

[output]
dir = "build"
path = "js/[name].[hash].js"
"#;

#[test]
fn build_writes_manifest_and_exits_zero() {
    let dir = project(SIMPLE);
    write(dir.path(), "src/main.js", "import './util.js';\n");
    write(dir.path(), "src/util.js", "export const x = 1;\n");

    cargo_bin_cmd!("tote")
        .args(["build", "--no-color", "--cwd"])
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Built 2 files"));

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("build/manifest.json")).unwrap()).unwrap();
    let app = manifest["src/main.js"]["outputPath"].as_str().unwrap();
    assert!(app.starts_with("js/app.") && app.ends_with(".js"));
    assert_eq!(manifest["src/util.js"]["outputPath"], "src/util.js");
}

#[test]
fn out_flag_overrides_output_dir() {
    let dir = project(SIMPLE);
    write(dir.path(), "src/main.js", "console.log(1);\n");

    cargo_bin_cmd!("tote")
        .args(["build", "-q", "--out", "dist", "--cwd"])
        .arg(dir.path())
        .assert()
        .success();

    assert!(dir.path().join("dist/manifest.json").is_file());
    assert!(!dir.path().join("build").exists());
}

#[test]
fn check_validates_without_writing() {
    let dir = project(SIMPLE);
    write(dir.path(), "src/main.js", "console.log(1);\n");

    cargo_bin_cmd!("tote")
        .args(["check", "--no-color", "--cwd"])
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Configuration is valid"));

    assert!(!dir.path().join("build").exists());
}

#[test]
fn missing_config_fails() {
    let dir = TempDir::new().unwrap();

    cargo_bin_cmd!("tote")
        .args(["build", "--no-color", "--cwd"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no tote.toml"));
}

#[test]
fn unknown_stage_is_reported_before_building() {
    let dir = project(&format!(
        "{SIMPLE}\n[[rules]]\ntest = \"\\\\.js$\"\nuse = [\"babel\"]\n"
    ));
    write(dir.path(), "src/main.js", "console.log(1);\n");

    cargo_bin_cmd!("tote")
        .args(["build", "--no-color", "--cwd"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("UnknownCollaboratorError"))
        .stderr(predicate::str::contains("babel"));

    assert!(!dir.path().join("build").exists());
}

#[cfg(unix)]
#[test]
fn failing_stage_exits_nonzero_and_leaves_marker() {
    let dir = project(&format!(
        "{SIMPLE}\n[[rules]]\ntest = \"\\\\.js$\"\n\n[[rules.use]]\nname = \"command\"\noptions = {{ program = \"sh\", args = [\"-c\", \"echo broken >&2; exit 1\"] }}\n"
    ));
    write(dir.path(), "src/main.js", "console.log(1);\n");

    cargo_bin_cmd!("tote")
        .args(["build", "--no-color", "--cwd"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("TransformError"))
        .stderr(predicate::str::contains("src/main.js"));

    let out = dir.path().join("build");
    assert!(!out.join("manifest.json").exists());
    let marker: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("BUILD_FAILED")).unwrap()).unwrap();
    assert_eq!(marker["kind"], "TransformError");
    assert_eq!(marker["file"], "src/main.js");
}
