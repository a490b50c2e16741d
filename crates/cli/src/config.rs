//! Project configuration loading.
//!
//! The project file (`artipack.toml` by default) declares modules and
//! artifacts. Layout trees reuse the engine's own serialization, so each
//! node is a table with a `kind` field:
//!
//! ```toml
//! [[module]]
//! id = "app"
//! source-roots = ["src"]
//!
//! [[artifact]]
//! id = "dist"
//!
//! [[artifact.root]]
//! kind = "dir-copy"
//! source = "resources"
//!
//! [[artifact.root]]
//! kind = "archive"
//! name = "app.jar"
//!
//! [[artifact.root.children]]
//! kind = "module-output"
//! module = "app"
//! ```
//!
//! Relative paths are resolved against the directory containing the
//! configuration file, which is also the project base.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use artipack_lib::layout::LayoutNode;
use artipack_lib::model::Project;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectConfig {
  #[serde(default, rename = "module")]
  pub modules: Vec<ModuleConfig>,

  #[serde(default, rename = "artifact")]
  pub artifacts: Vec<ArtifactConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ModuleConfig {
  pub id: String,
  pub source_roots: Vec<PathBuf>,
  /// Output directory; defaults to `out/production/<id>`.
  pub output: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ArtifactConfig {
  pub id: String,
  /// Children of the artifact's root directory.
  #[serde(default)]
  pub root: Vec<LayoutNode>,
  /// Output directory; defaults to `out/artifacts/<id>`.
  pub output: Option<PathBuf>,
}

/// Load the configuration file and open the project it declares.
pub fn load_project(config_path: &Path) -> Result<Project> {
  let text = fs::read_to_string(config_path)
    .with_context(|| format!("failed to read config file: {}", config_path.display()))?;
  let config: ProjectConfig =
    toml::from_str(&text).with_context(|| format!("invalid config file: {}", config_path.display()))?;

  let base = config_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
  let mut project = Project::open(base).context("failed to open project state")?;
  let base = project.base_path().to_path_buf();

  for module in config.modules {
    let source_roots: Vec<PathBuf> = module.source_roots.iter().map(|p| rebased(p, &base)).collect();
    match module.output {
      Some(output) => project.add_module_at(&module.id, source_roots, rebased(&output, &base)),
      None => project.add_module(&module.id, source_roots),
    };
  }

  for artifact in config.artifacts {
    let mut children = artifact.root;
    for child in &mut children {
      rebase_node(child, &base);
    }
    let root = LayoutNode::Dir {
      name: String::new(),
      children,
    };
    match artifact.output {
      Some(output) => project.add_artifact_at(&artifact.id, root, rebased(&output, &base)),
      None => project.add_artifact(&artifact.id, root),
    };
  }

  Ok(project)
}

fn rebased(path: &Path, base: &Path) -> PathBuf {
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    base.join(path)
  }
}

fn rebase_node(node: &mut LayoutNode, base: &Path) {
  match node {
    LayoutNode::Dir { children, .. } | LayoutNode::Archive { children, .. } => {
      for child in children {
        rebase_node(child, base);
      }
    }
    LayoutNode::FileCopy { source, .. } => *source = rebased(source, base),
    LayoutNode::DirCopy { source } => *source = rebased(source, base),
    LayoutNode::ExtractedDir { archive, .. } => *archive = rebased(archive, base),
    LayoutNode::ArtifactRef { .. } | LayoutNode::ModuleOutput { .. } => {}
  }
}
