//! Netdrop - chat-driven file publishing
//!
//! Usage:
//!   netdrop                  # Run the Telegram bot (default)
//!   netdrop deploy FILE...   # Publish local files directly
//!   netdrop config           # Show the effective configuration

mod bot;
mod telegram;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use netdrop_core::artifact::FileArtifact;
use netdrop_core::config::{NetdropConfig, to_toml};
use netdrop_core::deploy::{DeployOrchestrator, DeployOutcome, NetlifyClient};
use netdrop_core::error::ArtifactError;
use netdrop_core::pipeline::UploadPipeline;
use netdrop_core::validate::FileValidator;

use crate::bot::Bot;
use crate::telegram::TelegramClient;

#[derive(Parser)]
#[command(name = "netdrop")]
#[command(about = "Publish files sent to a Telegram bot to static hosting", long_about = None)]
struct Cli {
    /// Path to netdrop.toml (defaults to the user config directory)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot
    Run,

    /// Publish local files without going through the bot
    ///
    /// A single file is published under its own name (strategy permitting);
    /// several files are bundled into one zip archive.
    Deploy {
        /// Files to publish
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the effective configuration with credentials redacted
    Config,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netdrop=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    runtime.block_on(run_cli(cli.config.as_deref(), cli.command.unwrap_or(Commands::Run)))
}

async fn run_cli(config_path: Option<&Path>, command: Commands) -> Result<()> {
    let config = NetdropConfig::load(config_path)?;

    match command {
        Commands::Run => run_bot(config).await,
        Commands::Deploy { files } => run_deploy(&config, &files).await,
        Commands::Config => {
            print!("{}", to_toml(&config.redacted())?);
            Ok(())
        }
    }
}

fn hosting_client(config: &NetdropConfig) -> Result<NetlifyClient> {
    let hosting = &config.hosting;
    Ok(NetlifyClient::new(
        hosting.token.expose(),
        &hosting.site_id,
        hosting.request_timeout(),
    )?
    .with_api_base(hosting.api_base.as_str()))
}

async fn run_bot(config: NetdropConfig) -> Result<()> {
    config.validate_telegram().context("Invalid configuration")?;

    let telegram = TelegramClient::new(
        config.telegram.token.expose(),
        &config.telegram.api_base,
        config.telegram.poll_timeout(),
    )?
    .with_download_timeout(config.telegram.download_timeout());
    let orchestrator =
        DeployOrchestrator::new(hosting_client(&config)?, config.hosting.orchestrator_settings());
    let pipeline = UploadPipeline::from_config(&config, orchestrator, telegram);

    tracing::info!(
        site_id = %config.hosting.site_id,
        strategy = ?config.hosting.strategy,
        allowed_users = config.access.allowed_users.len(),
        "starting bot"
    );

    Bot::new(pipeline, config.telegram.processing_ack).run().await
}

async fn run_deploy(config: &NetdropConfig, files: &[PathBuf]) -> Result<()> {
    let validator = FileValidator::new(config.files.extension_policy());
    let limit = config.files.max_file_bytes;

    let mut artifacts = Vec::with_capacity(files.len());
    for path in files {
        let raw_name = path.file_name().and_then(|name| name.to_str());
        let name = validator
            .validate(raw_name)
            .with_context(|| format!("Cannot publish {}", path.display()))?;

        let artifact = FileArtifact::load(path, name).await?;
        if artifact.declared_size() > limit {
            return Err(ArtifactError::FileTooLarge {
                size: artifact.declared_size(),
                limit,
            })
            .with_context(|| format!("Cannot publish {}", path.display()));
        }
        artifacts.push(artifact);
    }

    let orchestrator =
        DeployOrchestrator::new(hosting_client(config)?, config.hosting.orchestrator_settings());

    match orchestrator.deploy_artifacts(artifacts).await {
        DeployOutcome::Published(published) => {
            if published.upload_skipped {
                println!("Content unchanged, published without upload.");
            }
            println!("✅ {}", published.url);
            Ok(())
        }
        DeployOutcome::Failed(err) => Err(anyhow::Error::new(err).context("Deploy failed")),
    }
}
