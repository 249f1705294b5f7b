use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tribute_core::impls::{DryRunChat, DryRunCommunity, TracingNotifier};
use tribute_core::ports::{Clock, SystemClock};
use tribute_core::store::TaskStore;
use tribute_core::{AppConfig, Collaborators, Orchestrator, init_logging};

#[derive(Parser)]
#[command(name = "tribute", version, about = "Reward redemption task orchestrator")]
struct Cli {
    /// Path to the TOML settings file
    #[arg(short, long, default_value = "settings.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator with dry-run platform adapters until Ctrl-C
    Run,
    /// Print the persisted task store as JSON
    Tasks,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    init_logging(&config.logging);

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Tasks => show_tasks(&config),
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let collaborators = Collaborators {
        chat: Arc::new(DryRunChat::new(config.channel.name.clone())),
        community: Arc::new(DryRunCommunity),
        notifier: Arc::new(TracingNotifier),
        clock: Arc::new(SystemClock),
    };

    let mut orchestrator = Orchestrator::new(&config, collaborators);
    orchestrator
        .restore()
        .await
        .context("failed to load task store")?;

    let handle = orchestrator.spawn();
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("shutdown requested, waiting for in-flight tasks");
    handle.shutdown_and_join().await;
    Ok(())
}

fn show_tasks(config: &AppConfig) -> Result<()> {
    let tasks = TaskStore::read(&config.store.path, SystemClock.now())
        .with_context(|| format!("failed to read {}", config.store.path.display()))?
        .unwrap_or_default();

    println!("{}", serde_json::to_string_pretty(&tasks)?);
    Ok(())
}
