//! docroute - purchase-order attachment extraction

use anyhow::{bail, Result};
use clap::Parser;
use docroute_common::logging::{init_logging, LogConfig, LogLevel};
use docroute_extract::{maintenance, ExtractorConfig, FlushPolicy, Orchestrator, S3Store, StorageConfig};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "docroute")]
#[command(author, version, about = "Route archived purchase-order attachments into per-order folders")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Archives extracted at once (overrides DOCROUTE_ARCHIVE_CONCURRENCY)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// When processed state is written: per-archive or end-of-run
    #[arg(long, global = true)]
    flush_policy: Option<FlushPolicy>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Extract every archive not yet processed
    Run,

    /// Delete all routed attachments under the destination root
    PurgeRouted {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Forget which archives were processed
    ResetState {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("docroute")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let mut config = ExtractorConfig::from_env()?;
    if let Some(concurrency) = cli.concurrency {
        config.archive_concurrency = concurrency;
    }
    if let Some(policy) = cli.flush_policy {
        config.flush_policy = policy;
    }
    config.validate()?;

    let store = S3Store::new(StorageConfig::from_env()?);
    info!("Using bucket {}", store.bucket());

    match cli.command {
        Command::Run => {
            let orchestrator = Orchestrator::new(Arc::new(store), config);
            let result = orchestrator.run().await?;
            info!(
                discovered = result.discovered,
                new_archives = result.new_archives,
                processed = result.processed,
                uploads = result.uploads,
                dropped = result.dropped_attachments,
                "Extraction complete in {:.2}s",
                result.duration_seconds
            );
        },
        Command::PurgeRouted { yes } => {
            if !yes {
                bail!(
                    "refusing to delete everything under '{}' without --yes",
                    config.destination_prefix()
                );
            }
            let deleted = maintenance::purge_routed(&store, &config).await?;
            info!("Removed {} routed objects", deleted);
        },
        Command::ResetState { yes } => {
            if !yes {
                bail!("refusing to delete '{}' without --yes", config.state_key);
            }
            maintenance::reset_state(&store, &config).await?;
        },
    }

    Ok(())
}
