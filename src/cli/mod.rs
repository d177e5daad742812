//! Command line interface.

use std::path::PathBuf;

use clap::Parser;

/// Git-mediated orchestrator coordinating small LLM workers through
/// branches and note annotations.
#[derive(Debug, Parser)]
#[command(name = "symergion", version, about)]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, env = "SYMERGION_CONFIG", default_value = ".symergion/config.json")]
    pub config: PathBuf,

    /// Local clone of the served repository.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Override the configured default branch.
    #[arg(long)]
    pub default_branch: Option<String>,

    /// Override the configured poll interval.
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,
}
