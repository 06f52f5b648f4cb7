use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use traceroute_collector::{
    orchestrator::{Orchestrator, RunOptions},
    settings::Settings,
};

/// Post-processing commands
#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    #[command(
        about = "Build the RTT matrix and aggregate statistics from an existing summary",
        after_help = r#"Examples:
    # Both reports from results/traceroute_summary.csv
    report

    # Only aggregates, plus a European breakdown
    report --aggregate --region eu"#
    )]
    Report {
        /// Write the RTT matrix
        #[arg(long)]
        matrix: bool,

        /// Write aggregate statistics
        #[arg(long)]
        aggregate: bool,

        /// Also write statistics for this business region
        #[arg(short, long)]
        region: Option<String>,

        /// Include the sub-colo matrix
        #[arg(short, long)]
        verbose: bool,

        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
}

pub async fn handle(mut settings: Settings, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Report {
            matrix,
            aggregate,
            region,
            verbose,
            output_dir,
        } => {
            super::apply_overrides(&mut settings, output_dir, None)?;

            // Neither flag means both reports
            let both = !matrix && !aggregate;
            let options = RunOptions {
                region: region.map(|r| r.to_lowercase()),
                verbose,
                matrix: matrix || both,
                aggregate: aggregate || both,
                post_process_only: true,
                ..Default::default()
            };

            Orchestrator::new(&settings).collect(&options).await?;
            Ok(())
        }
    }
}
