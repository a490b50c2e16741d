//! Layout descriptors: the declarative tree describing an artifact's output.
//!
//! A layout is an immutable snapshot once attached to an artifact. Edits go
//! through the project's modification transaction, which swaps in a whole
//! new tree on commit. Any node may nest any other node, so archives can
//! contain artifacts, artifacts can contain archives, and so on; the
//! resolver flattens the composition at build time.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::{ArtifactId, ModuleId};

/// One node of an artifact layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LayoutNode {
  /// A named directory in the output.
  Dir {
    name: String,
    #[serde(default)]
    children: Vec<LayoutNode>,
  },

  /// A named archive; children are packed into it.
  Archive {
    name: String,
    #[serde(default)]
    children: Vec<LayoutNode>,
  },

  /// A single source file, copied under its own (or a renamed) file name.
  ///
  /// The source may live outside every tracked content root; it is then
  /// tracked individually.
  FileCopy {
    source: PathBuf,
    #[serde(default)]
    rename: Option<String>,
  },

  /// A source directory whose files are copied recursively.
  ///
  /// Ignored folder names (`CVS` and friends) are skipped.
  DirCopy { source: PathBuf },

  /// The current layout of another artifact, resolved at build time.
  ArtifactRef { artifact: ArtifactId },

  /// The compiled output of a module, resolved at build time.
  ModuleOutput { module: ModuleId },

  /// The contents of an existing archive, unpacked into the output.
  ExtractedDir { archive: PathBuf, inner: String },
}

impl LayoutNode {
  /// An empty root directory node.
  pub fn empty_root() -> Self {
    LayoutNode::Dir {
      name: String::new(),
      children: Vec::new(),
    }
  }
}

/// Start building a directory-rooted layout.
pub fn root() -> LayoutBuilder {
  LayoutBuilder {
    node: LayoutNode::empty_root(),
  }
}

/// Start building an archive-rooted layout.
pub fn archive(name: &str) -> LayoutBuilder {
  LayoutBuilder {
    node: LayoutNode::Archive {
      name: name.to_string(),
      children: Vec::new(),
    },
  }
}

/// Fluent builder for layout trees.
///
/// ```
/// use artipack_lib::layout::root;
///
/// let layout = root()
///   .dir("conf", |d| d.file("settings.xml"))
///   .archive("app.jar", |a| a.file("main.txt"))
///   .build();
/// # let _ = layout;
/// ```
#[derive(Debug, Clone)]
pub struct LayoutBuilder {
  node: LayoutNode,
}

impl LayoutBuilder {
  fn push(mut self, child: LayoutNode) -> Self {
    match &mut self.node {
      LayoutNode::Dir { children, .. } | LayoutNode::Archive { children, .. } => children.push(child),
      _ => unreachable!("builder roots are always composite nodes"),
    }
    self
  }

  /// Copy a single file into the current node.
  pub fn file(self, source: impl Into<PathBuf>) -> Self {
    self.push(LayoutNode::FileCopy {
      source: source.into(),
      rename: None,
    })
  }

  /// Copy a single file under a different name.
  pub fn file_as(self, source: impl Into<PathBuf>, name: &str) -> Self {
    self.push(LayoutNode::FileCopy {
      source: source.into(),
      rename: Some(name.to_string()),
    })
  }

  /// Copy a directory tree into the current node.
  pub fn dir_copy(self, source: impl Into<PathBuf>) -> Self {
    self.push(LayoutNode::DirCopy { source: source.into() })
  }

  /// Add a named subdirectory populated by the closure.
  pub fn dir(self, name: &str, f: impl FnOnce(LayoutBuilder) -> LayoutBuilder) -> Self {
    let child = f(LayoutBuilder {
      node: LayoutNode::Dir {
        name: name.to_string(),
        children: Vec::new(),
      },
    });
    self.push(child.node)
  }

  /// Add a nested archive populated by the closure.
  pub fn archive(self, name: &str, f: impl FnOnce(LayoutBuilder) -> LayoutBuilder) -> Self {
    let child = f(LayoutBuilder {
      node: LayoutNode::Archive {
        name: name.to_string(),
        children: Vec::new(),
      },
    });
    self.push(child.node)
  }

  /// Include another artifact's layout.
  pub fn artifact(self, id: &ArtifactId) -> Self {
    self.push(LayoutNode::ArtifactRef { artifact: id.clone() })
  }

  /// Include a module's compiled output.
  pub fn module(self, id: &ModuleId) -> Self {
    self.push(LayoutNode::ModuleOutput { module: id.clone() })
  }

  /// Include the unpacked contents of an existing archive.
  pub fn extracted_dir(self, archive: impl Into<PathBuf>, inner: &str) -> Self {
    self.push(LayoutNode::ExtractedDir {
      archive: archive.into(),
      inner: inner.to_string(),
    })
  }

  /// Finish and return the layout tree.
  pub fn build(self) -> LayoutNode {
    self.node
  }
}
