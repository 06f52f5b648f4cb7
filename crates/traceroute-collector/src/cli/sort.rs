use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use tracing::info;
use traceroute_collector::{exporter::csv::sort_file_by_region, orchestrator::REGION_COLUMN};

#[derive(Subcommand, Debug)]
pub enum SortCommands {
    #[command(
        about = "Sort a CSV output file in place by region precedence",
        after_help = r#"Examples:
    sort results/traceroute_summary.csv
    sort results/aggregate_stats.csv --column region"#
    )]
    Sort {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Column holding the region
        #[arg(long, default_value = REGION_COLUMN)]
        column: String,
    },
}

pub fn handle(cmd: SortCommands) -> Result<()> {
    match cmd {
        SortCommands::Sort { file, column } => {
            sort_file_by_region(&file, &column)?;
            info!("Sorted {} by {column}", file.display());
            Ok(())
        }
    }
}
