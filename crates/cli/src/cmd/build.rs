//! Implementation of the `artipack build` command.

use std::path::Path;
use std::time::Instant;

use anyhow::{Result, bail};
use tracing::{debug, info};

use artipack_lib::model::{ArtifactId, ModuleId, Project, TargetId};
use artipack_lib::sync;

use crate::config;
use crate::output::{format_duration, print_error, print_info, print_success, symbols};

pub fn cmd_build(config_path: &Path, targets: &[String]) -> Result<()> {
  let mut project = config::load_project(config_path)?;

  let start = Instant::now();
  let batch = if targets.is_empty() {
    debug!("building all declared targets");
    sync::build_all(&mut project)?
  } else {
    let targets = resolve_targets(&project, targets)?;
    debug!(?targets, "building requested targets");
    sync::build(&mut project, &targets)?
  };

  let mut failed = 0;
  for (target, result) in &batch.results {
    match result {
      Ok(result) if result.is_up_to_date() => print_info(&format!("{}: up to date", target)),
      Ok(result) => {
        print_success(&format!(
          "{}: {} rebuilt, {} deleted",
          target,
          result.recompiled().len(),
          result.deleted().len()
        ));
        for path in result.recompiled() {
          println!("    {} {}", symbols::PLUS, path);
        }
        for path in result.deleted() {
          println!("    {} {}", symbols::MINUS, path);
        }
      }
      Err(e) => {
        failed += 1;
        print_error(&format!("{}: {}", target, e));
      }
    }
  }

  info!(targets = batch.results.len(), failed, "build request finished");
  println!("finished in {}", format_duration(start.elapsed()));
  if failed > 0 {
    bail!("{} target(s) failed", failed);
  }
  Ok(())
}

/// Map target names to ids; a bare name tries artifacts before modules.
fn resolve_targets(project: &Project, names: &[String]) -> Result<Vec<TargetId>> {
  names
    .iter()
    .map(|name| {
      if let Some(id) = name.strip_prefix("artifact:") {
        return Ok(TargetId::Artifact(ArtifactId::from(id)));
      }
      if let Some(id) = name.strip_prefix("module:") {
        return Ok(TargetId::Module(ModuleId::from(id)));
      }
      let artifact = ArtifactId::from(name.as_str());
      if project.artifact(&artifact).is_some() {
        return Ok(TargetId::Artifact(artifact));
      }
      let module = ModuleId::from(name.as_str());
      if project.module(&module).is_some() {
        return Ok(TargetId::Module(module));
      }
      bail!("unknown target: {}", name)
    })
    .collect()
}
