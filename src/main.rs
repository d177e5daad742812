//! SymErgion daemon entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use symergion::cli::Cli;
use symergion::infrastructure::{ConfigLoader, GitRepository, ProcessRuntime};
use symergion::services::TaskOrchestrator;
use symergion::ModelRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = ConfigLoader::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(branch) = cli.default_branch {
        config.default_branch = branch;
    }
    if let Some(secs) = cli.poll_interval_secs {
        config.poll_interval_secs = secs;
    }

    let repo = Arc::new(GitRepository::new(
        cli.repo.clone(),
        config.default_branch.clone(),
    ));
    let runtime: Arc<dyn ModelRuntime> =
        Arc::new(ProcessRuntime::new(config.runtime.clone(), config.idle_cores));
    let poll = Duration::from_secs(config.poll_interval_secs);
    let mut orchestrator = TaskOrchestrator::new(repo, runtime, config)?;

    info!(repo = %cli.repo.display(), "symergion started");
    loop {
        let events = orchestrator.tick().await;
        if events > 0 {
            debug!(events, "reconciliation tick complete");
        }
        tokio::time::sleep(poll).await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
