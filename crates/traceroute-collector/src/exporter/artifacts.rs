use crate::ingestor::types::{RawTraceroute, Target};
use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

const SUSPICIOUS_DIR: &str = "suspicious";

/// Raw JSON results laid out as `<root>/<region>/<colo>/<file>.json`
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Parallel tree for quarantined results: `<parent>/suspicious/<root name>`
    pub fn suspicious_root(&self) -> PathBuf {
        let name = self
            .root
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("results"));
        self.root
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(SUSPICIOUS_DIR)
            .join(name)
    }

    pub fn colo_dir(&self, region: &str, colo: &str) -> PathBuf {
        self.root.join(region).join(colo)
    }

    pub fn target_path(&self, region: &str, colo: &str, target: &Target) -> PathBuf {
        self.colo_dir(region, colo)
            .join(format!("{}_{}.json", target.name, target.ip))
    }

    pub fn subcolo_path(&self, region: &str, colo: &str, target: &Target, subcolo: &str) -> PathBuf {
        self.colo_dir(region, colo)
            .join(format!("{}_{subcolo}.json", target.name))
    }

    /// Pretty-printed JSON, replacing any previous file
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(value).context("Failed to serialize artifact")?;
        fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote artifact {}", path.display());
        Ok(())
    }

    /// Previously persisted per-target result, if one exists and still parses
    pub fn load_snapshot(&self, region: &str, colo: &str, target: &Target) -> Option<RawTraceroute> {
        let path = self.target_path(region, colo, target);
        let body = fs::read_to_string(&path).ok()?;
        match RawTraceroute::parse(&body) {
            Ok(traceroute) => Some(traceroute),
            Err(e) => {
                warn!("Ignoring unusable snapshot {}: {e}", path.display());
                None
            }
        }
    }

    /// Mirror `path` into the suspicious tree. The original is removed unless `keep`.
    pub fn quarantine(&self, path: &Path, keep: bool) -> Result<PathBuf> {
        let relative = path.strip_prefix(&self.root).with_context(|| {
            format!(
                "{} is outside the artifact root {}",
                path.display(),
                self.root.display()
            )
        })?;
        let destination = self.suspicious_root().join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        if keep {
            fs::copy(path, &destination)
        } else {
            fs::rename(path, &destination).map(|_| 0)
        }
        .with_context(|| {
            format!(
                "Failed to move {} to {}",
                path.display(),
                destination.display()
            )
        })?;

        debug!("Quarantined {} to {}", path.display(), destination.display());
        Ok(destination)
    }
}
