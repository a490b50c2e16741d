//! Implementation of the `artipack inspect` command.
//!
//! Lists every file an artifact's output currently contains, descending
//! into archives without extracting them.

use std::path::Path;

use anyhow::{Result, bail};

use artipack_lib::inspect::TreeSnapshot;
use artipack_lib::model::ArtifactId;

use crate::config;
use crate::output::{print_info, symbols};

pub fn cmd_inspect(config_path: &Path, artifact: &str) -> Result<()> {
  let project = config::load_project(config_path)?;

  let id = ArtifactId::from(artifact);
  let Some(artifact) = project.artifact(&id) else {
    bail!("unknown artifact: {}", id);
  };

  let snapshot = TreeSnapshot::read(&artifact.output_dir)?;
  if snapshot.is_empty() {
    print_info(&format!("{}: no output (not built yet?)", id));
    return Ok(());
  }

  println!("{} ({})", id, project.rel_display(&artifact.output_dir));
  for path in snapshot.paths() {
    println!("  {} {}", symbols::INFO, path);
  }
  Ok(())
}
