use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use tracing::info;
use traceroute_collector::{
    orchestrator::{Orchestrator, RunOptions},
    settings::Settings,
};

/// Acquisition commands
#[derive(Subcommand, Debug)]
pub enum CollectCommands {
    #[command(
        about = "Run traceroutes from colos to the configured targets",
        after_help = r#"Examples:
    # Trace from two colos and build the RTT matrix
    collect --colos sjc,ams --matrix

    # Every European colo, all sub-colos, with aggregate statistics
    collect --region eu --verbose --aggregate --keep-sorted

    # Reprocess previously saved results without network calls
    collect --colos sjc --use-local-snapshot"#
    )]
    Collect {
        /// Comma-separated colo codes
        #[arg(long, value_delimiter = ',', conflicts_with = "region")]
        colos: Vec<String>,

        /// Business region code (na, latam, eu, me, afr, apac)
        #[arg(short, long)]
        region: Option<String>,

        /// Skip mapping inferred hops to the nearest cloud region
        #[arg(long)]
        no_region_mapping: bool,

        /// Process every sub-colo returned for a colo
        #[arg(short, long)]
        verbose: bool,

        /// Write the RTT matrix
        #[arg(long)]
        matrix: bool,

        /// Write aggregate statistics
        #[arg(long)]
        aggregate: bool,

        /// Skip acquisition and only post-process the existing summary
        #[arg(long)]
        post_process_only: bool,

        /// Sort output files by region once collection finishes
        #[arg(long)]
        keep_sorted: bool,

        /// Use saved per-target results when present
        #[arg(long)]
        use_local_snapshot: bool,

        /// Retries per (colo, target) pair
        #[arg(long, value_name = "N")]
        retries: Option<u32>,

        /// Traceroute API endpoint
        #[arg(long, value_name = "URI")]
        uri: Option<String>,

        /// Comma-separated `ip:name:domain` targets
        #[arg(long, value_delimiter = ',')]
        targets: Vec<String>,

        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Colo metadata (.json or .csv)
        #[arg(long, value_name = "FILE")]
        colo_file: Option<PathBuf>,
    },
}

pub async fn handle(mut settings: Settings, cmd: CollectCommands) -> Result<()> {
    match cmd {
        CollectCommands::Collect {
            colos,
            region,
            no_region_mapping,
            verbose,
            matrix,
            aggregate,
            post_process_only,
            keep_sorted,
            use_local_snapshot,
            retries,
            uri,
            targets,
            output_dir,
            colo_file,
        } => {
            if let Some(retries) = retries {
                settings.retry.retries = retries;
            }
            if let Some(uri) = uri {
                settings.traceroute.uri = uri;
            }
            if !targets.is_empty() {
                settings.targets = targets;
            }
            super::apply_overrides(&mut settings, output_dir, colo_file)?;
            info!("{settings}");

            let options = RunOptions {
                colos,
                region: region.map(|r| r.to_lowercase()),
                region_mapping: !no_region_mapping,
                verbose,
                matrix,
                aggregate,
                post_process_only,
                keep_sorted,
                use_local_snapshot,
            };

            let summary = Orchestrator::new(&settings).collect(&options).await?;
            info!(
                "Done: {} samples, {} suspicious, {} skipped",
                summary.samples, summary.suspicious, summary.skipped
            );
            Ok(())
        }
    }
}
