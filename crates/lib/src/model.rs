//! Project model: artifacts, modules, and the modification transaction.
//!
//! The `Project` is the root object the engine operates on. It owns the
//! declared artifacts and modules, the source change tracker, the
//! notification bus and the persisted build state. Declarations are added
//! directly; *mutations* of existing artifacts (layout, output path,
//! removal) only take effect through a [`ModifiableModel`] transaction
//! that must be committed; dropping it discards the edits.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::changes::{ChangeKind, ChangeTracker};
use crate::consts::{DEFAULT_ARTIFACT_OUT, DEFAULT_MODULE_OUT, STATE_DIR};
use crate::layout::LayoutNode;
use crate::notify::ChangeBus;
use crate::state::{StateError, StateStore};
use crate::util::path::display_slashes;

/// Identifier of a declared artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub String);

impl fmt::Display for ArtifactId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for ArtifactId {
  fn from(s: &str) -> Self {
    Self(s.to_string())
  }
}

/// Identifier of a declared module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub String);

impl fmt::Display for ModuleId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for ModuleId {
  fn from(s: &str) -> Self {
    Self(s.to_string())
  }
}

/// A buildable unit: either a module compile or an artifact packaging.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetId {
  Module(ModuleId),
  Artifact(ArtifactId),
}

impl TargetId {
  /// Key under which this target's state is persisted.
  pub(crate) fn state_key(&self) -> String {
    match self {
      TargetId::Module(id) => format!("module:{}", id),
      TargetId::Artifact(id) => format!("artifact:{}", id),
    }
  }
}

impl fmt::Display for TargetId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TargetId::Module(id) => write!(f, "module {}", id),
      TargetId::Artifact(id) => write!(f, "artifact {}", id),
    }
  }
}

/// A named packaging target producing a directory or archive output.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
  pub id: ArtifactId,
  pub root: LayoutNode,
  /// Absolute output directory.
  pub output_dir: PathBuf,
}

/// A module: source roots plus the output directory its compile step
/// copies them to. The compiled output is an upstream producer for
/// `ModuleOutput` layout leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
  pub id: ModuleId,
  pub source_roots: Vec<PathBuf>,
  /// Absolute output directory.
  pub output_dir: PathBuf,
}

/// The project the engine builds: declarations plus tracked state.
#[derive(Debug)]
pub struct Project {
  base_path: PathBuf,
  artifacts: BTreeMap<ArtifactId, Artifact>,
  modules: BTreeMap<ModuleId, Module>,
  tracker: ChangeTracker,
  bus: ChangeBus,
  states: StateStore,
}

impl Project {
  /// Open a project rooted at `base_path`, loading persisted build state
  /// from `<base>/.artipack/` if present.
  pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StateError> {
    let base_path = base_path.into();
    let base_path = std::fs::canonicalize(&base_path).unwrap_or(base_path);
    let states = StateStore::open(base_path.join(STATE_DIR))?;
    Ok(Self {
      base_path,
      artifacts: BTreeMap::new(),
      modules: BTreeMap::new(),
      tracker: ChangeTracker::new(),
      bus: ChangeBus::new(),
      states,
    })
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  /// Declare an artifact with the default output directory
  /// `out/artifacts/<id>`.
  pub fn add_artifact(&mut self, id: &str, root: LayoutNode) -> ArtifactId {
    let output_dir = self.base_path.join(DEFAULT_ARTIFACT_OUT).join(id);
    self.add_artifact_at(id, root, output_dir)
  }

  /// Declare an artifact with an explicit output directory.
  pub fn add_artifact_at(&mut self, id: &str, root: LayoutNode, output_dir: impl Into<PathBuf>) -> ArtifactId {
    let id = ArtifactId::from(id);
    debug!(artifact = %id, "artifact declared");
    self.artifacts.insert(
      id.clone(),
      Artifact {
        id: id.clone(),
        root,
        output_dir: output_dir.into(),
      },
    );
    id
  }

  /// Declare a module with the default output directory
  /// `out/production/<id>`.
  pub fn add_module(&mut self, id: &str, source_roots: Vec<PathBuf>) -> ModuleId {
    let output_dir = self.base_path.join(DEFAULT_MODULE_OUT).join(id);
    self.add_module_at(id, source_roots, output_dir)
  }

  /// Declare a module with an explicit output directory.
  pub fn add_module_at(&mut self, id: &str, source_roots: Vec<PathBuf>, output_dir: impl Into<PathBuf>) -> ModuleId {
    let id = ModuleId::from(id);
    debug!(module = %id, "module declared");
    self.modules.insert(
      id.clone(),
      Module {
        id: id.clone(),
        source_roots,
        output_dir: output_dir.into(),
      },
    );
    id
  }

  pub fn artifact(&self, id: &ArtifactId) -> Option<&Artifact> {
    self.artifacts.get(id)
  }

  pub fn module(&self, id: &ModuleId) -> Option<&Module> {
    self.modules.get(id)
  }

  pub fn artifact_ids(&self) -> impl Iterator<Item = &ArtifactId> {
    self.artifacts.keys()
  }

  pub fn module_ids(&self) -> impl Iterator<Item = &ModuleId> {
    self.modules.keys()
  }

  /// Record a source change. The caller is whatever watches the file
  /// system (an IDE's VFS, a watcher, or a test driving the engine).
  pub fn record_change(&mut self, path: impl Into<PathBuf>, kind: ChangeKind) {
    self.tracker.record(path, kind);
  }

  /// Drop change records below `seq` from the in-memory log.
  ///
  /// Callers typically pass the smallest cursor still persisted across
  /// their targets; see [`crate::changes::ChangeTracker::compact`].
  pub fn compact_changes(&mut self, seq: u64) {
    self.tracker.compact(seq);
  }

  /// Subscribe to the batched "output changed" event.
  pub fn subscribe(&mut self, listener: impl Fn() + Send + 'static) {
    self.bus.subscribe(listener);
  }

  /// Persisted build state for a target, if it has ever been built.
  pub fn target_state(&self, target: &TargetId) -> Option<&crate::state::TargetState> {
    self.states.get(&target.state_key())
  }

  /// Begin a modification transaction.
  pub fn modifiable(&mut self) -> ModifiableModel<'_> {
    ModifiableModel {
      project: self,
      edits: Vec::new(),
    }
  }

  /// Render a path for reports: project-relative with forward slashes
  /// when under the base, absolute otherwise.
  pub fn rel_display(&self, path: &Path) -> String {
    match path.strip_prefix(&self.base_path) {
      Ok(rel) => display_slashes(rel),
      Err(_) => display_slashes(path),
    }
  }

  pub(crate) fn tracker(&self) -> &ChangeTracker {
    &self.tracker
  }

  pub(crate) fn states(&self) -> &StateStore {
    &self.states
  }

  pub(crate) fn states_mut(&mut self) -> &mut StateStore {
    &mut self.states
  }

  pub(crate) fn bus(&self) -> &ChangeBus {
    &self.bus
  }
}

enum Edit {
  AddArtifact(Artifact),
  RemoveArtifact(ArtifactId),
  SetRoot(ArtifactId, LayoutNode),
  SetOutputDir(ArtifactId, PathBuf),
}

/// Pending project edits; nothing is visible to builds until
/// [`ModifiableModel::commit`] runs.
pub struct ModifiableModel<'a> {
  project: &'a mut Project,
  edits: Vec<Edit>,
}

impl ModifiableModel<'_> {
  /// Stage a new artifact with the default output directory.
  pub fn add_artifact(&mut self, id: &str, root: LayoutNode) -> ArtifactId {
    let id = ArtifactId::from(id);
    let output_dir = self.project.base_path.join(DEFAULT_ARTIFACT_OUT).join(&id.0);
    self.edits.push(Edit::AddArtifact(Artifact {
      id: id.clone(),
      root,
      output_dir,
    }));
    id
  }

  /// Stage removal of an artifact and its persisted state.
  pub fn remove_artifact(&mut self, id: &ArtifactId) {
    self.edits.push(Edit::RemoveArtifact(id.clone()));
  }

  /// Stage a replacement layout for an artifact.
  pub fn set_root(&mut self, id: &ArtifactId, root: LayoutNode) {
    self.edits.push(Edit::SetRoot(id.clone(), root));
  }

  /// Stage a new output directory for an artifact.
  pub fn set_output_dir(&mut self, id: &ArtifactId, output_dir: impl Into<PathBuf>) {
    self.edits.push(Edit::SetOutputDir(id.clone(), output_dir.into()));
  }

  /// Apply all staged edits to the project.
  pub fn commit(self) {
    for edit in self.edits {
      match edit {
        Edit::AddArtifact(artifact) => {
          self.project.artifacts.insert(artifact.id.clone(), artifact);
        }
        Edit::RemoveArtifact(id) => {
          self.project.artifacts.remove(&id);
          let key = TargetId::Artifact(id).state_key();
          self.project.states.remove(&key);
        }
        Edit::SetRoot(id, root) => {
          if let Some(artifact) = self.project.artifacts.get_mut(&id) {
            artifact.root = root;
          }
        }
        Edit::SetOutputDir(id, output_dir) => {
          if let Some(artifact) = self.project.artifacts.get_mut(&id) {
            artifact.output_dir = output_dir;
          }
        }
      }
    }
  }
}
