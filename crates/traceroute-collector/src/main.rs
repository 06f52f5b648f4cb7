mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::{collect::CollectCommands, report::ReportCommands, sort::SortCommands};
use std::{fs::OpenOptions, path::PathBuf, sync::Arc};
use traceroute_collector::settings::Settings;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "traceroute-collector",
    about = "Samples traceroutes from edge colos, locates the last hop and reports latency by region",
    version,
    author,
    after_help = r#"Configuration:
    Configuration can be provided via:
    1. Environment variables with TRACE__ prefix (e.g., TRACE__RETRY__RETRIES=5)
    2. .env file in the current directory
    3. Config file with -c option (TOML)

Examples:
    # Collect from two colos and build every report
    traceroute-collector collect --colos sjc,ams --matrix --aggregate

    # Reports only, from an earlier run
    traceroute-collector report --region eu

    # Re-sort an output file
    traceroute-collector sort results/skipped_colos.csv"#
)]
pub struct Cli {
    /// Path to the configuration file (TOML format)
    ///
    /// If not provided, will attempt to load from environment variables
    #[clap(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Collect(CollectCommands),
    #[command(flatten)]
    Report(ReportCommands),
    #[command(flatten)]
    Sort(SortCommands),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let settings = if let Some(config_path) = &self.config {
            Settings::from_path(config_path)?
        } else {
            Settings::from_env()?
        };
        init_logging(&settings.log_level, settings.log_file.as_ref())?;

        // Route to module handlers
        match self.command {
            Commands::Collect(cmd) => cli::collect::handle(settings, cmd).await,
            Commands::Report(cmd) => cli::report::handle(settings, cmd).await,
            Commands::Sort(cmd) => cli::sort::handle(cmd),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run().await
}

fn init_logging(log_level: &str, log_file: Option<&PathBuf>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(file_layer)
        .init();

    Ok(())
}
