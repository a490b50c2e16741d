//! Incremental output synchronization.
//!
//! The synchronizer brings artifact and module outputs in sync with their
//! layouts and sources, doing the least work it can justify:
//!
//! 1. Resolve each target's layout to a flat destination → producer map.
//! 2. Decide staleness per destination: never built, output directory
//!    externally removed, output path changed, producer changed since the
//!    target's change-log cursor, fingerprint drift, or missing output.
//! 3. Apply deletions (orphans first) before writes so destinations can
//!    be reused deterministically; any touched archive is rewritten whole.
//! 4. Report per target what was recompiled and deleted, or `UpToDate`
//!    with zero side effects.
//!
//! A batch fires at most one change notification, after all mutations are
//! durable. Configuration errors fail the request before any mutation;
//! per-target I/O errors are confined to that target's result slot.

mod archive;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::changes::ChangeKind;
use crate::model::{ArtifactId, ModuleId, Project, TargetId};
use crate::resolve::{self, EntrySource, ResolveError, ResolvedEntry};
use crate::state::{StateError, TargetState};
use crate::util::hash::hash_file;
use crate::util::path::split_archive;

/// Outcome of building one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildResult {
  /// Nothing was stale; the build had no side effects.
  UpToDate,
  /// Sources (project-relative) whose outputs were rewritten.
  Recompiled(Vec<String>),
  /// Rewritten sources plus output paths that were deleted.
  RecompiledAndDeleted {
    recompiled: Vec<String>,
    deleted: Vec<String>,
  },
}

impl BuildResult {
  pub fn is_up_to_date(&self) -> bool {
    matches!(self, BuildResult::UpToDate)
  }

  pub fn recompiled(&self) -> &[String] {
    match self {
      BuildResult::UpToDate => &[],
      BuildResult::Recompiled(r) => r,
      BuildResult::RecompiledAndDeleted { recompiled, .. } => recompiled,
    }
  }

  pub fn deleted(&self) -> &[String] {
    match self {
      BuildResult::RecompiledAndDeleted { deleted, .. } => deleted,
      _ => &[],
    }
  }

  fn from_parts(recompiled: Vec<String>, deleted: Vec<String>) -> Self {
    if deleted.is_empty() {
      BuildResult::Recompiled(recompiled)
    } else {
      BuildResult::RecompiledAndDeleted { recompiled, deleted }
    }
  }
}

/// Per-target outcomes of one build request.
#[derive(Debug)]
pub struct BatchResult {
  pub results: BTreeMap<TargetId, Result<BuildResult, SyncError>>,
}

impl BatchResult {
  pub fn of(&self, target: &TargetId) -> Option<&Result<BuildResult, SyncError>> {
    self.results.get(target)
  }

  /// Whether every target completed without work or errors.
  pub fn all_up_to_date(&self) -> bool {
    self.results.values().all(|r| matches!(r, Ok(b) if b.is_up_to_date()))
  }
}

/// Per-target failures: confined to one target's result slot.
#[derive(Debug, Error)]
pub enum SyncError {
  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error("failed to create directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to delete {path}: {source}")]
  Delete {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read source {path}: {source}")]
  ReadSource {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to pack archive {path}: {message}")]
  Archive { path: PathBuf, message: String },
}

/// Request-level failures: nothing was mutated when these are returned,
/// except `State`, which is raised after mutations when persisting the
/// build cursor fails.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("configuration error: {0}")]
  Config(#[from] ResolveError),

  #[error(transparent)]
  State(#[from] StateError),

  #[error(transparent)]
  Sync(#[from] SyncError),
}

/// Build a batch of targets.
///
/// Artifact targets implicitly compile the modules their layouts
/// reference (transitively through included artifacts) first, the way an
/// IDE "make" does. Exactly one change notification fires if anything in
/// the batch mutated output.
pub fn build(project: &mut Project, targets: &[TargetId]) -> Result<BatchResult, BuildError> {
  let targets = expand_targets(project, targets)?;

  let artifact_roots: Vec<ArtifactId> = targets
    .iter()
    .filter_map(|t| match t {
      TargetId::Artifact(id) => Some(id.clone()),
      TargetId::Module(_) => None,
    })
    .collect();
  resolve::validate_references(project, &artifact_roots)?;

  let mut results = BTreeMap::new();
  let mut any_changed = false;

  for target in &targets {
    let outcome = sync_target(project, target);
    match &outcome {
      Ok(result) if !result.is_up_to_date() => {
        debug!(target = %target, ?result, "target rebuilt");
        any_changed = true;
      }
      Ok(_) => debug!(target = %target, "target up to date"),
      Err(e) => warn!(target = %target, error = %e, "target failed"),
    }
    results.insert(target.clone(), outcome);
  }

  project.states_mut().save()?;

  if any_changed {
    info!(targets = targets.len(), "build batch changed output");
    project.bus().fire();
  }

  Ok(BatchResult { results })
}

/// Build a single target and return its result directly.
pub fn make(project: &mut Project, target: &TargetId) -> Result<BuildResult, BuildError> {
  let mut batch = build(project, std::slice::from_ref(target))?;
  batch
    .results
    .remove(target)
    .expect("requested target is present in its own batch")
    .map_err(BuildError::from)
}

/// Build every declared module and artifact, modules first.
pub fn build_all(project: &mut Project) -> Result<BatchResult, BuildError> {
  let mut targets: Vec<TargetId> = project.module_ids().cloned().map(TargetId::Module).collect();
  targets.extend(project.artifact_ids().cloned().map(TargetId::Artifact));
  build(project, &targets)
}

/// Expand a request with the modules its artifacts depend on, keeping
/// request order and deduplicating.
fn expand_targets(project: &Project, requested: &[TargetId]) -> Result<Vec<TargetId>, ResolveError> {
  let mut expanded = Vec::new();
  let mut seen = BTreeSet::new();

  for target in requested {
    if let TargetId::Artifact(id) = target {
      for module in collect_module_deps(project, id)? {
        let module_target = TargetId::Module(module);
        if seen.insert(module_target.clone()) {
          expanded.push(module_target);
        }
      }
    }
    if let TargetId::Module(id) = target
      && project.module(id).is_none()
    {
      return Err(ResolveError::MissingModule(id.clone()));
    }
    if seen.insert(target.clone()) {
      expanded.push(target.clone());
    }
  }
  Ok(expanded)
}

/// Modules an artifact pulls in, transitively through artifact references.
fn collect_module_deps(project: &Project, id: &ArtifactId) -> Result<Vec<ModuleId>, ResolveError> {
  let mut modules = Vec::new();
  let mut seen_artifacts = BTreeSet::new();
  let mut pending = vec![id.clone()];

  while let Some(artifact_id) = pending.pop() {
    if !seen_artifacts.insert(artifact_id.clone()) {
      continue;
    }
    let artifact = project
      .artifact(&artifact_id)
      .ok_or_else(|| ResolveError::MissingArtifact(artifact_id.clone()))?;
    let mut artifact_refs = Vec::new();
    resolve::collect_refs(&artifact.root, &mut artifact_refs, &mut modules);
    pending.extend(artifact_refs);
  }

  let mut deduped = Vec::new();
  for module in modules {
    if !deduped.contains(&module) {
      deduped.push(module);
    }
  }
  Ok(deduped)
}

fn sync_target(project: &mut Project, target: &TargetId) -> Result<BuildResult, SyncError> {
  match target {
    TargetId::Artifact(id) => {
      let artifact = project.artifact(id).expect("validated before sync").clone();
      let entries = resolve::resolve_artifact(project, &artifact)?;
      sync_entries(project, target, &artifact.output_dir, entries, false)
    }
    TargetId::Module(id) => {
      let module = project.module(id).expect("validated before sync").clone();
      let entries = resolve::resolve_module(&module)?;
      sync_entries(project, target, &module.output_dir, entries, true)
    }
  }
}

/// Synchronize one target's resolved entries with its output directory.
///
/// `record_outputs` is set for modules: their written and deleted output
/// files are recorded as source changes so that dependent artifacts see
/// them as upstream producers.
fn sync_entries(
  project: &mut Project,
  target: &TargetId,
  output_dir: &Path,
  entries: Vec<ResolvedEntry>,
  record_outputs: bool,
) -> Result<BuildResult, SyncError> {
  let key = target.state_key();
  let base = project.base_path().to_path_buf();
  let output_dir_state = output_dir
    .strip_prefix(&base)
    .map(Path::to_path_buf)
    .unwrap_or_else(|_| output_dir.to_path_buf());
  let out_display = project.rel_display(output_dir);

  let prev = project.states().get(&key).cloned();
  let mut deleted_reports: Vec<String> = Vec::new();

  // An output path change drops the whole old tree before anything else.
  let mut moved = false;
  if let Some(prev_state) = &prev
    && prev_state.output_dir != output_dir_state
  {
    moved = true;
    let old_root = if prev_state.output_dir.is_absolute() {
      prev_state.output_dir.clone()
    } else {
      base.join(&prev_state.output_dir)
    };
    let old_display = project.rel_display(&old_root);
    let mut disk_files = BTreeSet::new();
    for dest in &prev_state.outputs {
      deleted_reports.push(format!("{}/{}", old_display, dest));
      let file = split_archive(dest).map(|(top, _)| top).unwrap_or(dest);
      disk_files.insert(file.to_string());
    }
    for rel in disk_files {
      let path = old_root.join(&rel);
      remove_file_if_exists(&path)?;
      prune_empty_dirs(&path, &old_root);
    }
  }

  // Never built, output moved, or output directory externally removed:
  // rebuild from clean.
  let fresh = prev.is_none() || moved || !output_dir.exists();
  let prev_state = if fresh { None } else { prev };

  let changes = match &prev_state {
    Some(state) => project.tracker().changes_since(state.seq),
    None => BTreeMap::new(),
  };

  // Final producer per destination; declaration order, last one wins.
  let mut final_producer: BTreeMap<String, EntrySource> = BTreeMap::new();
  for entry in &entries {
    final_producer.insert(entry.dest.clone(), entry.source.clone());
  }
  let dests: BTreeSet<String> = final_producer.keys().cloned().collect();

  // Fingerprint each distinct watched source once.
  let mut hash_cache: BTreeMap<PathBuf, Option<String>> = BTreeMap::new();
  for entry in &entries {
    let watch = entry.source.watch_path().to_path_buf();
    hash_cache
      .entry(watch.clone())
      .or_insert_with(|| hash_file(&watch).ok().map(|h| h.0));
  }

  // Staleness: every producer participates, even ones that lose the
  // final-writer race for a shared destination.
  let mut stale: BTreeSet<String> = BTreeSet::new();
  let mut recompiled: BTreeSet<String> = BTreeSet::new();
  let mut fingerprints: BTreeMap<String, String> = BTreeMap::new();
  for entry in &entries {
    let watch = entry.source.watch_path();
    let display = project.rel_display(watch);
    let current = hash_cache.get(watch).cloned().flatten();
    if let Some(hash) = &current {
      fingerprints.insert(display.clone(), hash.clone());
    }

    let is_stale = match &prev_state {
      None => true,
      Some(state) => {
        let changed = changes.contains_key(watch);
        let drifted = state.sources.get(&display).map(String::as_str) != current.as_deref();
        let on_disk = split_archive(&entry.dest).map(|(top, _)| top).unwrap_or(&entry.dest);
        let missing = !output_dir.join(on_disk).exists();
        changed || drifted || missing
      }
    };
    if is_stale {
      stale.insert(entry.dest.clone());
      recompiled.insert(display);
    }
  }

  // Orphans: previously produced destinations with no current producer.
  let orphans: BTreeSet<String> = match &prev_state {
    Some(state) => state.outputs.difference(&dests).cloned().collect(),
    None => BTreeSet::new(),
  };

  if prev_state.is_some() && stale.is_empty() && orphans.is_empty() && deleted_reports.is_empty() {
    return Ok(BuildResult::UpToDate);
  }

  // Deletions before writes, so destinations can be reused.
  let mut archives_to_rewrite: BTreeSet<String> = stale
    .iter()
    .filter_map(|dest| split_archive(dest).map(|(top, _)| top.to_string()))
    .collect();

  for dest in &orphans {
    deleted_reports.push(format!("{}/{}", out_display, dest));
    match split_archive(dest) {
      Some((top, _)) => {
        let still_populated = dests.iter().any(|d| split_archive(d).is_some_and(|(t, _)| t == top));
        if still_populated {
          archives_to_rewrite.insert(top.to_string());
        } else {
          let path = output_dir.join(top);
          remove_file_if_exists(&path)?;
          prune_empty_dirs(&path, output_dir);
        }
      }
      None => {
        let path = output_dir.join(dest);
        remove_file_if_exists(&path)?;
        prune_empty_dirs(&path, output_dir);
      }
    }
  }

  // Writes: loose files individually, touched archives whole.
  fs::create_dir_all(output_dir).map_err(|e| SyncError::CreateDir {
    path: output_dir.to_path_buf(),
    source: e,
  })?;

  for dest in &stale {
    if split_archive(dest).is_some() {
      continue;
    }
    let target_path = output_dir.join(dest);
    if let Some(parent) = target_path.parent() {
      fs::create_dir_all(parent).map_err(|e| SyncError::CreateDir {
        path: parent.to_path_buf(),
        source: e,
      })?;
    }
    let content = archive::read_source(&final_producer[dest])?;
    fs::write(&target_path, content).map_err(|e| SyncError::Write {
      path: target_path.clone(),
      source: e,
    })?;
  }

  for top in &archives_to_rewrite {
    let boundary = format!("{}!/", top);
    let members: Vec<(String, EntrySource)> = entries
      .iter()
      .filter_map(|e| {
        e.dest
          .strip_prefix(&boundary)
          .map(|rest| (rest.to_string(), e.source.clone()))
      })
      .collect();
    archive::write_archive(&output_dir.join(top), &members)?;
  }

  // Module outputs feed dependent artifacts through the change log.
  if record_outputs {
    let prev_outputs = prev_state.as_ref().map(|s| s.outputs.clone()).unwrap_or_default();
    for dest in &stale {
      let kind = if prev_outputs.contains(dest) {
        ChangeKind::Modified
      } else {
        ChangeKind::Added
      };
      project.record_change(output_dir.join(dest), kind);
    }
    for dest in &orphans {
      project.record_change(output_dir.join(dest), ChangeKind::Deleted);
    }
  }

  let new_state = TargetState {
    seq: project.tracker().current_seq(),
    output_dir: output_dir_state,
    outputs: dests,
    sources: fingerprints,
  };
  project.states_mut().set(key, new_state);

  deleted_reports.sort();
  Ok(BuildResult::from_parts(recompiled.into_iter().collect(), deleted_reports))
}

fn remove_file_if_exists(path: &Path) -> Result<(), SyncError> {
  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(SyncError::Delete {
      path: path.to_path_buf(),
      source: e,
    }),
  }
}

/// Remove directories left empty by a deletion, up to (but excluding)
/// `stop_root`.
fn prune_empty_dirs(deleted_file: &Path, stop_root: &Path) {
  let mut dir = deleted_file.parent();
  while let Some(d) = dir {
    if d == stop_root || fs::remove_dir(d).is_err() {
      break;
    }
    dir = d.parent();
  }
}
