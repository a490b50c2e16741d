//! Shared helpers for engine integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use artipack_lib::changes::ChangeKind;
use artipack_lib::model::{ArtifactId, ModuleId, Project, TargetId};
use artipack_lib::sync::{self, BuildResult};
use tempfile::TempDir;

/// A project in a temp directory, driven the way an IDE would drive the
/// engine: file edits go to disk and are reported as change events.
pub struct TestProject {
  pub temp: TempDir,
  pub project: Project,
}

impl TestProject {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let project = Project::open(temp.path()).unwrap();
    Self { temp, project }
  }

  pub fn base(&self) -> PathBuf {
    self.project.base_path().to_path_buf()
  }

  /// Create a file under the project base and report it as added.
  pub fn create_file(&mut self, rel: &str, content: &str) -> PathBuf {
    let path = self.base().join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    self.project.record_change(&path, ChangeKind::Added);
    path
  }

  /// Overwrite a file and report it as modified.
  pub fn change_file(&mut self, rel: &str, content: &str) -> PathBuf {
    let path = self.base().join(rel);
    fs::write(&path, content).unwrap();
    self.project.record_change(&path, ChangeKind::Modified);
    path
  }

  /// Remove a file and report it as deleted.
  pub fn delete_file(&mut self, rel: &str) {
    let path = self.base().join(rel);
    fs::remove_file(&path).unwrap();
    self.project.record_change(&path, ChangeKind::Deleted);
  }

  /// Rename a file and report the rename.
  pub fn rename_file(&mut self, from: &str, to: &str) -> PathBuf {
    let old = self.base().join(from);
    let new = self.base().join(to);
    fs::rename(&old, &new).unwrap();
    self.project.record_change(&new, ChangeKind::Renamed { from: old });
    new
  }

  pub fn make_artifact(&mut self, id: &ArtifactId) -> BuildResult {
    self.make(&TargetId::Artifact(id.clone()))
  }

  pub fn make_module(&mut self, id: &ModuleId) -> BuildResult {
    self.make(&TargetId::Module(id.clone()))
  }

  pub fn make(&mut self, target: &TargetId) -> BuildResult {
    sync::make(&mut self.project, target).unwrap()
  }

  /// The artifact's output directory on disk.
  pub fn out(&self, id: &ArtifactId) -> PathBuf {
    self.project.artifact(id).unwrap().output_dir.clone()
  }
}

pub fn assert_up_to_date(result: &BuildResult) {
  assert!(result.is_up_to_date(), "expected up to date, got {:?}", result);
}

pub fn assert_recompiled(result: &BuildResult, expected: &[&str]) {
  assert_recompiled_and_deleted(result, expected, &[]);
}

pub fn assert_recompiled_and_deleted(result: &BuildResult, recompiled: &[&str], deleted: &[&str]) {
  let mut want_recompiled: Vec<&str> = recompiled.to_vec();
  want_recompiled.sort_unstable();
  let mut want_deleted: Vec<&str> = deleted.to_vec();
  want_deleted.sort_unstable();

  let got_recompiled: Vec<&str> = result.recompiled().iter().map(String::as_str).collect();
  let got_deleted: Vec<&str> = result.deleted().iter().map(String::as_str).collect();
  assert_eq!(got_recompiled, want_recompiled, "recompiled mismatch in {:?}", result);
  assert_eq!(got_deleted, want_deleted, "deleted mismatch in {:?}", result);
}
