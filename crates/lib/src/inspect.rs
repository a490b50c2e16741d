//! Output tree inspection.
//!
//! Read-only verification of a produced output tree. `TreeSnapshot`
//! enumerates loose files and, for recognized archive extensions, the
//! entries inside (nested archives included) without extracting anything
//! to disk. `TreeSpec` builds the expected shape and compares it against
//! a snapshot by (path, optional content) equality; content comparison is
//! exact bytes, never hashed.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

use crate::util::path::{display_slashes, has_archive_extension, join_dest};

/// Errors from reading or verifying an output tree.
#[derive(Debug, Error)]
pub enum InspectError {
  #[error("failed to walk output {path}: {message}")]
  Walk { path: PathBuf, message: String },

  #[error("failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read archive {path}: {source}")]
  Archive {
    path: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("output tree mismatch:\n{}", differences.join("\n"))]
  Mismatch { differences: Vec<String> },
}

/// The observed contents of an output root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreeSnapshot {
  /// File contents keyed by output path (`!/` crosses archive boundaries).
  entries: BTreeMap<String, Vec<u8>>,
  /// Paths that are archives (loose or nested).
  archives: BTreeSet<String>,
}

impl TreeSnapshot {
  /// Read the tree under `root`. A missing root reads as an empty tree.
  pub fn read(root: &Path) -> Result<Self, InspectError> {
    let mut snapshot = TreeSnapshot::default();
    if !root.exists() {
      return Ok(snapshot);
    }

    for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
      let entry = entry.map_err(|e| InspectError::Walk {
        path: root.to_path_buf(),
        message: e.to_string(),
      })?;
      if !entry.file_type().is_file() {
        continue;
      }
      let rel = display_slashes(entry.path().strip_prefix(root).unwrap_or(entry.path()));
      let bytes = fs::read(entry.path()).map_err(|e| InspectError::Io {
        path: entry.path().to_path_buf(),
        source: e,
      })?;

      if has_archive_extension(&rel) {
        snapshot.archives.insert(rel.clone());
        read_archive(&bytes, &format!("{}!/", rel), &mut snapshot)?;
      } else {
        snapshot.entries.insert(rel, bytes);
      }
    }
    Ok(snapshot)
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty() && self.archives.is_empty()
  }

  /// Content of a single entry, if present.
  pub fn entry(&self, path: &str) -> Option<&[u8]> {
    self.entries.get(path).map(|b| b.as_slice())
  }

  /// All entry paths, sorted.
  pub fn paths(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(|s| s.as_str())
  }

  /// All archive paths, sorted.
  pub fn archive_paths(&self) -> impl Iterator<Item = &str> {
    self.archives.iter().map(|s| s.as_str())
  }
}

fn read_archive(bytes: &[u8], prefix: &str, snapshot: &mut TreeSnapshot) -> Result<(), InspectError> {
  let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(|e| InspectError::Archive {
    path: PathBuf::from(prefix.trim_end_matches("!/")),
    source: e,
  })?;

  for i in 0..zip.len() {
    let mut entry = zip.by_index(i).map_err(|e| InspectError::Archive {
      path: PathBuf::from(prefix.trim_end_matches("!/")),
      source: e,
    })?;
    if entry.is_dir() {
      continue;
    }
    let name = entry.name().to_string();
    let key = join_dest(prefix, &name);
    let mut content = Vec::new();
    entry.read_to_end(&mut content).map_err(|e| InspectError::Io {
      path: PathBuf::from(&key),
      source: e,
    })?;

    if has_archive_extension(&name) {
      snapshot.archives.insert(key.clone());
      read_archive(&content, &format!("{}!/", key), snapshot)?;
    } else {
      snapshot.entries.insert(key, content);
    }
  }
  Ok(())
}

#[derive(Debug, Clone)]
enum Expected {
  Present,
  Text(String),
}

/// Expected shape of an output tree.
///
/// Built with the same nesting vocabulary the layout DSL uses:
///
/// ```
/// use artipack_lib::inspect::TreeSpec;
///
/// let spec = TreeSpec::new()
///   .dir("conf", |d| d.file_text("a.txt", "a"))
///   .archive("app.jar", |a| a.file("main.txt"));
/// # let _ = spec;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TreeSpec {
  expected: BTreeMap<String, Expected>,
  archives: BTreeSet<String>,
}

impl TreeSpec {
  pub fn new() -> Self {
    Self::default()
  }

  /// Expect a file to exist, with any content.
  pub fn file(mut self, name: &str) -> Self {
    self.expected.insert(name.to_string(), Expected::Present);
    self
  }

  /// Expect a file with exactly this content.
  pub fn file_text(mut self, name: &str, content: &str) -> Self {
    self.expected.insert(name.to_string(), Expected::Text(content.to_string()));
    self
  }

  /// Expect a subdirectory described by the closure.
  pub fn dir(mut self, name: &str, f: impl FnOnce(TreeSpec) -> TreeSpec) -> Self {
    let child = f(TreeSpec::new());
    for (path, expected) in child.expected {
      self.expected.insert(format!("{}/{}", name, path), expected);
    }
    for path in child.archives {
      self.archives.insert(format!("{}/{}", name, path));
    }
    self
  }

  /// Expect an archive whose entries are described by the closure.
  pub fn archive(mut self, name: &str, f: impl FnOnce(TreeSpec) -> TreeSpec) -> Self {
    let child = f(TreeSpec::new());
    self.archives.insert(name.to_string());
    for (path, expected) in child.expected {
      self.expected.insert(format!("{}!/{}", name, path), expected);
    }
    for path in child.archives {
      self.archives.insert(format!("{}!/{}", name, path));
    }
    self
  }

  /// Compare this spec against the tree under `root`.
  ///
  /// The comparison is exact in both directions: unexpected entries are
  /// reported just like missing ones.
  pub fn verify(&self, root: &Path) -> Result<(), InspectError> {
    let snapshot = TreeSnapshot::read(root)?;
    let mut differences = Vec::new();

    for (path, expected) in &self.expected {
      match (expected, snapshot.entry(path)) {
        (_, None) => differences.push(format!("missing: {}", path)),
        (Expected::Text(want), Some(got)) if got != want.as_bytes() => {
          differences.push(format!(
            "content mismatch at {}: expected {:?}, found {:?}",
            path,
            want,
            String::from_utf8_lossy(got)
          ));
        }
        _ => {}
      }
    }

    for path in snapshot.paths() {
      if !self.expected.contains_key(path) {
        differences.push(format!("unexpected: {}", path));
      }
    }

    let actual_archives: BTreeSet<String> = snapshot.archive_paths().map(str::to_string).collect();
    for missing in self.archives.difference(&actual_archives) {
      differences.push(format!("missing archive: {}", missing));
    }
    for unexpected in actual_archives.difference(&self.archives) {
      differences.push(format!("unexpected archive: {}", unexpected));
    }

    if differences.is_empty() {
      Ok(())
    } else {
      Err(InspectError::Mismatch { differences })
    }
  }
}
