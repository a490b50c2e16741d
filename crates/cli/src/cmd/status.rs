//! Implementation of the `artipack status` command.
//!
//! Shows, per declared target, whether a build has ever completed and
//! what it produced, from the persisted state alone.

use std::path::Path;

use anyhow::Result;

use artipack_lib::model::{Project, TargetId};

use crate::config;
use crate::output::{print_json, print_stat};

pub fn cmd_status(config_path: &Path, json: bool) -> Result<()> {
  let project = config::load_project(config_path)?;

  let mut targets: Vec<TargetId> = project.module_ids().cloned().map(TargetId::Module).collect();
  targets.extend(project.artifact_ids().cloned().map(TargetId::Artifact));

  if json {
    let entries: Vec<_> = targets
      .iter()
      .map(|target| match project.target_state(target) {
        Some(state) => serde_json::json!({
          "target": target.to_string(),
          "built": true,
          "output_dir": state.output_dir,
          "outputs": state.outputs.len(),
        }),
        None => serde_json::json!({
          "target": target.to_string(),
          "built": false,
        }),
      })
      .collect();
    return print_json(&entries);
  }

  if targets.is_empty() {
    println!("no targets declared");
    return Ok(());
  }

  for target in &targets {
    println!("{}", target);
    match project.target_state(target) {
      Some(state) => {
        print_stat("output", &state.output_dir.display().to_string());
        print_stat("files", &state.outputs.len().to_string());
      }
      None => print_stat("built", "never"),
    }
  }
  Ok(())
}
