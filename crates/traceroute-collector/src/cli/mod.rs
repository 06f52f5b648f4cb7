pub mod collect;
pub mod report;
pub mod sort;

use anyhow::Result;
use std::path::PathBuf;
use traceroute_collector::settings::{Settings, validation::validate_config};

/// Apply command-line overrides on top of the loaded settings and re-validate
pub fn apply_overrides(
    settings: &mut Settings,
    output_dir: Option<PathBuf>,
    colo_file: Option<PathBuf>,
) -> Result<()> {
    if let Some(dir) = output_dir {
        settings.output.dir = dir;
    }
    if let Some(file) = colo_file {
        settings.output.colo_file = file;
    }
    validate_config(settings)
}
