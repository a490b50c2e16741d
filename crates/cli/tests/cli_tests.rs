//! CLI tests for artipack.
//!
//! Each test runs the binary against a throwaway project directory and
//! checks exit codes, terminal output, and the files produced.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn artipack_cmd() -> Command {
  cargo_bin_cmd!("artipack")
}

/// A project declaring one module and one artifact packing it into an
/// archive next to loose resources.
const PROJECT: &str = r#"
[[module]]
id = "app"
source-roots = ["src"]

[[artifact]]
id = "dist"

[[artifact.root]]
kind = "dir-copy"
source = "resources"

[[artifact.root]]
kind = "archive"
name = "app.jar"

[[artifact.root.children]]
kind = "module-output"
module = "app"
"#;

fn temp_project() -> TempDir {
  let temp = TempDir::new().unwrap();
  fs::write(temp.path().join("artipack.toml"), PROJECT).unwrap();
  write(temp.path(), "src/main.txt", "main");
  write(temp.path(), "resources/readme.txt", "readme");
  temp
}

fn write(base: &Path, rel: &str, content: &str) {
  let path = base.join(rel);
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, content).unwrap();
}

#[test]
fn help_flag_works() {
  artipack_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  artipack_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("artipack"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["build", "status", "inspect"] {
    artipack_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

#[test]
fn build_produces_declared_outputs() {
  let temp = temp_project();

  artipack_cmd()
    .arg("build")
    .current_dir(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("rebuilt"));

  assert!(temp.path().join("out/production/app/main.txt").exists());
  assert!(temp.path().join("out/artifacts/dist/readme.txt").exists());
  assert!(temp.path().join("out/artifacts/dist/app.jar").exists());
}

#[test]
fn second_build_is_up_to_date() {
  let temp = temp_project();

  artipack_cmd().arg("build").current_dir(temp.path()).assert().success();
  artipack_cmd()
    .arg("build")
    .current_dir(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("up to date"));
}

#[test]
fn changed_source_rebuilds_on_next_run() {
  let temp = temp_project();
  artipack_cmd().arg("build").current_dir(temp.path()).assert().success();

  write(temp.path(), "resources/readme.txt", "readme-v2");
  artipack_cmd()
    .arg("build")
    .arg("dist")
    .current_dir(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("resources/readme.txt"));

  let content = fs::read_to_string(temp.path().join("out/artifacts/dist/readme.txt")).unwrap();
  assert_eq!(content, "readme-v2");
}

#[test]
fn unknown_target_fails() {
  let temp = temp_project();

  artipack_cmd()
    .arg("build")
    .arg("ghost")
    .current_dir(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown target"));
}

#[test]
fn missing_config_fails() {
  let temp = TempDir::new().unwrap();

  artipack_cmd()
    .arg("build")
    .current_dir(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("artipack.toml"));
}

#[test]
fn status_reflects_build_state() {
  let temp = temp_project();

  artipack_cmd()
    .arg("status")
    .current_dir(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("never"));

  artipack_cmd().arg("build").current_dir(temp.path()).assert().success();

  artipack_cmd()
    .arg("status")
    .current_dir(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("out/artifacts/dist"));
}

#[test]
fn status_json_is_machine_readable() {
  let temp = temp_project();
  artipack_cmd().arg("build").current_dir(temp.path()).assert().success();

  let output = artipack_cmd()
    .arg("status")
    .arg("--json")
    .current_dir(temp.path())
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
  let entries = parsed.as_array().unwrap();
  assert_eq!(entries.len(), 2);
  assert!(entries.iter().all(|e| e["built"] == true));
}

#[test]
fn inspect_descends_into_archives() {
  let temp = temp_project();
  artipack_cmd().arg("build").current_dir(temp.path()).assert().success();

  artipack_cmd()
    .arg("inspect")
    .arg("dist")
    .current_dir(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("app.jar!/main.txt"))
    .stdout(predicate::str::contains("readme.txt"));
}

#[test]
fn inspect_unknown_artifact_fails() {
  let temp = temp_project();

  artipack_cmd()
    .arg("inspect")
    .arg("ghost")
    .current_dir(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown artifact"));
}
