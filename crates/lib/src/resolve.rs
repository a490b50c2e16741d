//! Layout resolution.
//!
//! Flattens an artifact's layout tree into an ordered list of output
//! entries, each pairing a destination path with the source that produces
//! it. Destinations use `!/` to cross archive boundaries, so a file inside
//! a nested archive resolves to e.g. `a.jar!/inner.jar!/f.txt`.
//!
//! Artifact references are resolved against the *current* layout of the
//! referenced artifact, so its changes propagate without re-declaring the
//! referencing artifact. Reference cycles and dangling references are
//! configuration errors detected before any output operation runs.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

use crate::consts::IGNORED_DIR_NAMES;
use crate::layout::LayoutNode;
use crate::model::{Artifact, ArtifactId, Module, ModuleId, Project};
use crate::util::path::{display_slashes, join_dest};

/// Errors from layout resolution and reference validation.
#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("unknown artifact referenced: {0}")]
  MissingArtifact(ArtifactId),

  #[error("unknown module referenced: {0}")]
  MissingModule(ModuleId),

  #[error("artifact reference cycle involving '{0}'")]
  CycleDetected(ArtifactId),

  #[error("failed to walk directory {path}: {message}")]
  Walk { path: PathBuf, message: String },

  #[error("failed to read archive {path}: {source}")]
  Archive {
    path: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("failed to open {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Where an output entry's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
  /// A loose file on disk.
  File(PathBuf),
  /// An entry inside an existing archive on disk.
  ArchiveEntry { archive: PathBuf, entry: String },
}

impl EntrySource {
  /// The on-disk path whose changes make this entry stale.
  pub fn watch_path(&self) -> &Path {
    match self {
      EntrySource::File(path) => path,
      EntrySource::ArchiveEntry { archive, .. } => archive,
    }
  }
}

/// One flattened output entry: destination plus producing source.
///
/// The list an artifact resolves to may contain several producers for the
/// same destination; the last one wins when writing, but every producer
/// participates in staleness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
  pub dest: String,
  pub source: EntrySource,
}

/// Validate all artifact and module references reachable from `roots`.
///
/// Builds the reference graph and topologically sorts it; a cycle or a
/// dangling reference is fatal for the whole build request.
pub fn validate_references(project: &Project, roots: &[ArtifactId]) -> Result<(), ResolveError> {
  let mut graph: DiGraph<ArtifactId, ()> = DiGraph::new();
  let mut nodes: BTreeMap<ArtifactId, NodeIndex> = BTreeMap::new();
  let mut pending: Vec<ArtifactId> = roots.to_vec();

  while let Some(id) = pending.pop() {
    if nodes.contains_key(&id) {
      continue;
    }
    let artifact = project.artifact(&id).ok_or_else(|| ResolveError::MissingArtifact(id.clone()))?;
    let idx = graph.add_node(id.clone());
    nodes.insert(id.clone(), idx);

    let mut artifact_refs = Vec::new();
    let mut module_refs = Vec::new();
    collect_refs(&artifact.root, &mut artifact_refs, &mut module_refs);

    for module_id in module_refs {
      if project.module(&module_id).is_none() {
        return Err(ResolveError::MissingModule(module_id));
      }
    }
    pending.extend(artifact_refs);
  }

  // Second pass for edges, now that every reachable node exists.
  for (id, &idx) in &nodes {
    let artifact = project.artifact(id).ok_or_else(|| ResolveError::MissingArtifact(id.clone()))?;
    let mut artifact_refs = Vec::new();
    collect_refs(&artifact.root, &mut artifact_refs, &mut Vec::new());
    for referenced in artifact_refs {
      let Some(&ref_idx) = nodes.get(&referenced) else {
        return Err(ResolveError::MissingArtifact(referenced));
      };
      graph.add_edge(ref_idx, idx, ());
    }
  }

  toposort(&graph, None).map_err(|cycle| ResolveError::CycleDetected(graph[cycle.node_id()].clone()))?;
  Ok(())
}

pub(crate) fn collect_refs(node: &LayoutNode, artifacts: &mut Vec<ArtifactId>, modules: &mut Vec<ModuleId>) {
  match node {
    LayoutNode::Dir { children, .. } | LayoutNode::Archive { children, .. } => {
      for child in children {
        collect_refs(child, artifacts, modules);
      }
    }
    LayoutNode::ArtifactRef { artifact } => artifacts.push(artifact.clone()),
    LayoutNode::ModuleOutput { module } => modules.push(module.clone()),
    LayoutNode::FileCopy { .. } | LayoutNode::DirCopy { .. } | LayoutNode::ExtractedDir { .. } => {}
  }
}

/// Resolve an artifact's layout against the current project and file
/// system. Missing source files yield no entry; their previously produced
/// output becomes an orphan for the synchronizer to delete.
pub fn resolve_artifact(project: &Project, artifact: &Artifact) -> Result<Vec<ResolvedEntry>, ResolveError> {
  let mut out = Vec::new();
  let mut visiting = vec![artifact.id.clone()];
  resolve_node(project, &artifact.root, "", &mut visiting, &mut out)?;
  debug!(artifact = %artifact.id, entries = out.len(), "layout resolved");
  Ok(out)
}

/// Resolve a module compile: every file under its source roots maps to
/// the same relative path in the module output.
pub fn resolve_module(module: &Module) -> Result<Vec<ResolvedEntry>, ResolveError> {
  let mut out = Vec::new();
  for source_root in &module.source_roots {
    if source_root.is_dir() {
      walk_dir(source_root, "", &mut out)?;
    }
  }
  debug!(module = %module.id, entries = out.len(), "module sources resolved");
  Ok(out)
}

fn resolve_node(
  project: &Project,
  node: &LayoutNode,
  prefix: &str,
  visiting: &mut Vec<ArtifactId>,
  out: &mut Vec<ResolvedEntry>,
) -> Result<(), ResolveError> {
  match node {
    LayoutNode::Dir { name, children } => {
      let prefix = if name.is_empty() {
        prefix.to_string()
      } else {
        join_dest(prefix, name)
      };
      for child in children {
        resolve_node(project, child, &prefix, visiting, out)?;
      }
    }

    LayoutNode::Archive { name, children } => {
      let prefix = format!("{}!/", join_dest(prefix, name));
      for child in children {
        resolve_node(project, child, &prefix, visiting, out)?;
      }
    }

    LayoutNode::FileCopy { source, rename } => {
      if source.is_file() {
        let name = match rename {
          Some(name) => name.clone(),
          None => source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        };
        out.push(ResolvedEntry {
          dest: join_dest(prefix, &name),
          source: EntrySource::File(source.clone()),
        });
      }
    }

    LayoutNode::DirCopy { source } => {
      if source.is_dir() {
        walk_dir(source, prefix, out)?;
      }
    }

    LayoutNode::ArtifactRef { artifact } => {
      if visiting.contains(artifact) {
        return Err(ResolveError::CycleDetected(artifact.clone()));
      }
      let referenced = project
        .artifact(artifact)
        .ok_or_else(|| ResolveError::MissingArtifact(artifact.clone()))?;
      visiting.push(artifact.clone());
      resolve_node(project, &referenced.root, prefix, visiting, out)?;
      visiting.pop();
    }

    LayoutNode::ModuleOutput { module } => {
      let module = project.module(module).ok_or_else(|| ResolveError::MissingModule(module.clone()))?;
      if module.output_dir.is_dir() {
        walk_dir(&module.output_dir, prefix, out)?;
      }
    }

    LayoutNode::ExtractedDir { archive, inner } => {
      if archive.is_file() {
        resolve_extracted(archive, inner, prefix, out)?;
      }
    }
  }
  Ok(())
}

/// Enumerate files under `dir`, skipping ignored folder names.
fn walk_dir(dir: &Path, prefix: &str, out: &mut Vec<ResolvedEntry>) -> Result<(), ResolveError> {
  let walker = walkdir::WalkDir::new(dir).sort_by_file_name().into_iter().filter_entry(|e| {
    e.file_name()
      .to_str()
      .map(|name| !IGNORED_DIR_NAMES.contains(&name))
      .unwrap_or(true)
  });

  for entry in walker {
    let entry = entry.map_err(|e| ResolveError::Walk {
      path: dir.to_path_buf(),
      message: e.to_string(),
    })?;
    if !entry.file_type().is_file() {
      continue;
    }
    let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
    out.push(ResolvedEntry {
      dest: join_dest(prefix, &display_slashes(rel)),
      source: EntrySource::File(entry.path().to_path_buf()),
    });
  }
  Ok(())
}

/// Enumerate an existing archive's entries under `inner` without
/// extracting it to disk.
fn resolve_extracted(archive: &Path, inner: &str, prefix: &str, out: &mut Vec<ResolvedEntry>) -> Result<(), ResolveError> {
  let file = fs::File::open(archive).map_err(|e| ResolveError::Io {
    path: archive.to_path_buf(),
    source: e,
  })?;
  let mut zip = ZipArchive::new(file).map_err(|e| ResolveError::Archive {
    path: archive.to_path_buf(),
    source: e,
  })?;

  let inner = inner.trim_matches('/');
  for i in 0..zip.len() {
    let entry = zip.by_index(i).map_err(|e| ResolveError::Archive {
      path: archive.to_path_buf(),
      source: e,
    })?;
    if entry.is_dir() {
      continue;
    }
    let name = entry.name().to_string();
    let rel = if inner.is_empty() {
      Some(name.as_str())
    } else {
      name.strip_prefix(inner).and_then(|r| r.strip_prefix('/'))
    };
    if let Some(rel) = rel {
      out.push(ResolvedEntry {
        dest: join_dest(prefix, rel),
        source: EntrySource::ArchiveEntry {
          archive: archive.to_path_buf(),
          entry: name.clone(),
        },
      });
    }
  }
  Ok(())
}
