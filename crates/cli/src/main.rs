use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod config;
mod output;

/// artipack - incremental artifact packaging
#[derive(Parser)]
#[command(name = "artipack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build targets incrementally (all declared targets if none given)
  Build {
    /// Targets: artifact or module names, optionally prefixed with
    /// `artifact:` or `module:`
    targets: Vec<String>,

    /// Path to the project configuration file
    #[arg(short, long, default_value = "artipack.toml")]
    config: PathBuf,
  },

  /// Show the persisted build state of every declared target
  Status {
    /// Path to the project configuration file
    #[arg(short, long, default_value = "artipack.toml")]
    config: PathBuf,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,
  },

  /// List what an artifact's output currently contains
  Inspect {
    /// Artifact to inspect
    artifact: String,

    /// Path to the project configuration file
    #[arg(short, long, default_value = "artipack.toml")]
    config: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Build { targets, config } => cmd::cmd_build(&config, &targets),
    Commands::Status { config, json } => cmd::cmd_status(&config, json),
    Commands::Inspect { artifact, config } => cmd::cmd_inspect(&config, &artifact),
  }
}
