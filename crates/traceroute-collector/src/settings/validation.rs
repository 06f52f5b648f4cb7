use crate::{
    geo::regions::{BUSINESS_REGIONS, is_business_region_code},
    ingestor::types::Target,
    orchestrator::RunOptions,
    settings::Settings,
};
use anyhow::{Result, bail};

fn validate_uri(name: &str, uri: &str) -> Result<()> {
    if uri.is_empty() {
        bail!("{name} URI cannot be empty");
    }
    if !uri.starts_with("http://") && !uri.starts_with("https://") {
        bail!("{name} URI must start with http:// or https://");
    }
    Ok(())
}

/// Validate the configuration values
pub fn validate_config(settings: &Settings) -> Result<()> {
    validate_uri("Traceroute", &settings.traceroute.uri)?;
    validate_uri("GeoIP", &settings.geoip.uri)?;

    if settings.traceroute.request_timeout_secs == 0 {
        bail!("Traceroute request timeout must be greater than 0");
    }
    if settings.geoip.request_timeout_secs == 0 {
        bail!("GeoIP request timeout must be greater than 0");
    }

    match settings
        .output
        .colo_file
        .extension()
        .and_then(|e| e.to_str())
    {
        Some("json") | Some("csv") => {}
        _ => bail!(
            "Unsupported colo file '{}'. Expected a .json or .csv file",
            settings.output.colo_file.display()
        ),
    }
    if settings.output.dir.as_os_str().is_empty() {
        bail!("Output directory cannot be empty");
    }

    if settings.targets.is_empty() {
        bail!("At least one target is required");
    }
    for target in &settings.targets {
        target.parse::<Target>()?;
    }

    if settings.pipeline.concurrency == 0 {
        bail!("Pipeline concurrency must be greater than 0");
    }
    if settings.pipeline.pair_deadline_secs == 0 {
        bail!("Pipeline pair_deadline_secs must be greater than 0");
    }

    let thresholds = &settings.thresholds;
    if thresholds.suspicious_distance_km <= 0.0 {
        bail!(
            "Threshold suspicious_distance_km must be positive, got {}",
            thresholds.suspicious_distance_km
        );
    }
    if thresholds.suspicious_rtt_ms <= 0.0 {
        bail!(
            "Threshold suspicious_rtt_ms must be positive, got {}",
            thresholds.suspicious_rtt_ms
        );
    }
    if thresholds.congestion_loss_pct <= 0.0 || thresholds.congestion_loss_pct > 100.0 {
        bail!(
            "Threshold congestion_loss_pct must be within (0, 100], got {}",
            thresholds.congestion_loss_pct
        );
    }

    // Validate log level
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&settings.log_level.to_lowercase().as_str()) {
        bail!(
            "Invalid log level '{}'. Valid options are: {:?}",
            settings.log_level,
            valid_log_levels
        );
    }

    Ok(())
}

/// Validate per-invocation options before any work starts
pub fn validate_run_options(options: &RunOptions) -> Result<()> {
    if !options.colos.is_empty() && options.region.is_some() {
        bail!("Provide either a colo list or a region, not both");
    }

    if let Some(region) = &options.region {
        if !is_business_region_code(region) {
            let mut codes: Vec<&str> = BUSINESS_REGIONS.iter().map(|(_, c)| *c).collect();
            codes.dedup();
            bail!("Unknown region '{region}'. Valid options are: {codes:?}");
        }
    }

    if !options.post_process_only && options.colos.is_empty() && options.region.is_none() {
        bail!("A colo list or a region is required unless only post-processing");
    }

    if options.post_process_only && options.use_local_snapshot {
        bail!("use_local_snapshot has no effect when only post-processing");
    }

    Ok(())
}
