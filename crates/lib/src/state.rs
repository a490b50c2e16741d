//! Persisted build state.
//!
//! One JSON document per project, written atomically, holding for each
//! build target the change-log cursor it last built at, the output
//! directory it wrote to, the destinations it produced, and a content
//! fingerprint per source. This is the only durable metadata beyond the
//! output tree itself; it is what lets a restarted process answer
//! "up to date" without an in-memory change log.
//!
//! # Storage layout
//!
//! ```text
//! {base}/.artipack/
//! └── state.json        # StateFile: version + per-target states
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{STATE_FILENAME, STATE_VERSION};

/// Errors from loading or saving persisted state.
#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to create state directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read state file: {0}")]
  Read(#[source] io::Error),

  #[error("failed to parse state file: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("unsupported state file version: {0}")]
  UnsupportedVersion(u32),

  #[error("failed to write state file: {0}")]
  Write(#[source] io::Error),
}

/// Persisted state of one build target (an artifact or a module).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetState {
  /// Change-log cursor stored after the last successful build.
  pub seq: u64,

  /// Output directory the last build wrote to, project-relative.
  pub output_dir: PathBuf,

  /// Destinations produced by the last build.
  pub outputs: BTreeSet<String>,

  /// Content fingerprint per source path, keyed by display path.
  pub sources: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
  version: u32,
  targets: BTreeMap<String, TargetState>,
}

/// On-disk store of [`TargetState`] records.
#[derive(Debug)]
pub struct StateStore {
  dir: PathBuf,
  targets: BTreeMap<String, TargetState>,
  dirty: bool,
}

impl StateStore {
  /// Open the store under `dir`, loading the state file if present.
  pub fn open(dir: PathBuf) -> Result<Self, StateError> {
    let path = dir.join(STATE_FILENAME);
    let targets = match fs::read_to_string(&path) {
      Ok(content) => {
        let file: StateFile = serde_json::from_str(&content).map_err(StateError::Parse)?;
        if file.version != STATE_VERSION {
          return Err(StateError::UnsupportedVersion(file.version));
        }
        file.targets
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
      Err(e) => return Err(StateError::Read(e)),
    };

    Ok(Self {
      dir,
      targets,
      dirty: false,
    })
  }

  pub fn get(&self, key: &str) -> Option<&TargetState> {
    self.targets.get(key)
  }

  pub fn set(&mut self, key: String, state: TargetState) {
    self.targets.insert(key, state);
    self.dirty = true;
  }

  pub fn remove(&mut self, key: &str) {
    if self.targets.remove(key).is_some() {
      self.dirty = true;
    }
  }

  /// Whether there are unsaved modifications.
  pub fn is_dirty(&self) -> bool {
    self.dirty
  }

  /// Write the state file atomically: a temp file in the same directory
  /// is persisted over the old one, so readers never see a torn file.
  pub fn save(&mut self) -> Result<(), StateError> {
    if !self.dirty {
      return Ok(());
    }

    fs::create_dir_all(&self.dir).map_err(StateError::CreateDir)?;

    let file = StateFile {
      version: STATE_VERSION,
      targets: self.targets.clone(),
    };
    let json = serde_json::to_string_pretty(&file).expect("state file serialization is infallible");

    let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(StateError::Write)?;
    tmp.write_all(json.as_bytes()).map_err(StateError::Write)?;
    tmp
      .persist(self.dir.join(STATE_FILENAME))
      .map_err(|e| StateError::Write(e.error))?;

    debug!(targets = self.targets.len(), "state file saved");
    self.dirty = false;
    Ok(())
  }
}
