pub mod validation;

use crate::{
    ingestor::{fetcher::LinearBackoff, types::Target},
    processor::{
        anomaly::AnomalyThresholds,
        constants::{CONGESTION_LOSS_PCT, SUSPICIOUS_MAX_RTT_MS, SUSPICIOUS_MIN_DISTANCE_KM},
    },
};
use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};
use validation::validate_config;

const ENV_PREFIX: &str = "TRACE";

/// Main settings configuration for the traceroute collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level for application logging (e.g., "info", "debug", "warn", "error")
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Optional file receiving a copy of the logs
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub traceroute: TracerouteSettings,
    #[serde(default)]
    pub geoip: GeoIpSettings,
    #[serde(default)]
    pub output: OutputSettings,
    /// Targets as `ip:name:domain`
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub thresholds: ThresholdSettings,
}

/// Traceroute API endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerouteSettings {
    pub uri: String,
    pub request_timeout_secs: u64,
}

impl Default for TracerouteSettings {
    fn default() -> Self {
        Self {
            uri: "https://findit.martelogan.workers.dev/trace".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// GeoIP API endpoint, queried as `{uri}/{ip}/json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoIpSettings {
    pub uri: String,
    pub request_timeout_secs: u64,
}

impl Default for GeoIpSettings {
    fn default() -> Self {
        Self {
            uri: "https://ipinfo.io".to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Root of the CSV outputs and the artifact tree
    pub dir: PathBuf,
    /// Colo metadata, `.json` or `.csv`
    pub colo_file: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
            colo_file: PathBuf::from("cf_colos.json"),
        }
    }
}

/// Linear backoff: retry n waits `backoff_step_secs * n`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub retries: u32,
    pub backoff_step_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_step_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// (colo, target) pairs processed at once
    pub concurrency: usize,
    /// Upper bound on one pair, retries included
    pub pair_deadline_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            pair_deadline_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    pub suspicious_distance_km: f64,
    pub suspicious_rtt_ms: f64,
    pub congestion_loss_pct: f64,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            suspicious_distance_km: SUSPICIOUS_MIN_DISTANCE_KM,
            suspicious_rtt_ms: SUSPICIOUS_MAX_RTT_MS,
            congestion_loss_pct: CONGESTION_LOSS_PCT,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_targets() -> Vec<String> {
    vec!["1.1.1.1:cf-global-dns:one.one.one.one".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
            traceroute: TracerouteSettings::default(),
            geoip: GeoIpSettings::default(),
            output: OutputSettings::default(),
            targets: default_targets(),
            retry: RetrySettings::default(),
            pipeline: PipelineSettings::default(),
            thresholds: ThresholdSettings::default(),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("targets")
        .try_parsing(true)
}

impl Settings {
    /// Load configuration from a specific config file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Env vars take priority over the file
        let settings: Settings = ConfigBuilder::builder()
            .add_source(File::with_name(&path.as_ref().to_string_lossy()))
            .add_source(environment())
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        validate_config(&settings)?;

        Ok(settings)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        // NOTE: It's ok if this fails (file might not exist)
        let _ = dotenvy::dotenv();

        let settings: Settings = ConfigBuilder::builder()
            .add_source(environment())
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        validate_config(&settings)?;

        Ok(settings)
    }

    pub fn parsed_targets(&self) -> Result<Vec<Target>> {
        self.targets
            .iter()
            .map(|t| t.parse::<Target>())
            .collect()
    }

    pub fn backoff(&self) -> LinearBackoff {
        LinearBackoff::new(
            Duration::from_secs(self.retry.backoff_step_secs),
            self.retry.retries,
        )
    }

    pub fn anomaly_thresholds(&self) -> AnomalyThresholds {
        AnomalyThresholds {
            min_distance_km: self.thresholds.suspicious_distance_km,
            max_rtt_ms: self.thresholds.suspicious_rtt_ms,
        }
    }

    pub fn pair_deadline(&self) -> Duration {
        Duration::from_secs(self.pipeline.pair_deadline_secs)
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings {{\n\
             \tLog Level: {}\n\
             \tTraceroute URI: {}\n\
             \tGeoIP URI: {}\n\
             \tOutput Dir: {}\n\
             \tColo File: {}\n\
             \tTargets: {}\n\
             \tRetries: {} (step {}s)\n\
             \tConcurrency: {}\n\
             }}",
            self.log_level,
            self.traceroute.uri,
            self.geoip.uri,
            self.output.dir.display(),
            self.output.colo_file.display(),
            self.targets.join(", "),
            self.retry.retries,
            self.retry.backoff_step_secs,
            self.pipeline.concurrency,
        )
    }
}
